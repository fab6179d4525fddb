use ampere::{INFER, Tensor};
use proptest::prelude::*;

fn matrix(rows: usize, cols: usize, seed: u64) -> Tensor {
    let data = (0..rows * cols)
        .map(|i| ((i as u64 * 31 + seed) % 97) as f64 - 48.0)
        .collect();
    Tensor::from_vec(data, &[rows, cols]).unwrap()
}

/// A tensor of rank 2, 4 or 6 paired with a random permutation of its axes
fn tensor_and_axes() -> impl Strategy<Value = (Tensor, Vec<usize>)> {
    prop_oneof![Just(2usize), Just(4), Just(6)]
        .prop_flat_map(|rank| {
            (
                proptest::collection::vec(1..4usize, rank),
                Just((0..rank).collect::<Vec<_>>()).prop_shuffle(),
            )
        })
        .prop_map(|(dims, axes)| {
            let n: usize = dims.iter().product();
            let data = (0..n).map(|i| i as f64).collect();
            (Tensor::from_vec(data, &dims).unwrap(), axes)
        })
}

proptest! {
    #[test]
    fn prop_reshape_keeps_order(rows in 1..12usize, cols in 1..12usize, seed in 0..1000u64) {
        let t = matrix(rows, cols, seed);
        let r = t.reshape(&[1, 1, INFER, 1]).unwrap();
        prop_assert_eq!(r.shape(), &[1, 1, rows * cols, 1][..]);
        prop_assert_eq!(r.data(), t.data());
        let back = r.reshape(&[rows as isize, cols as isize]).unwrap();
        prop_assert_eq!(back, t);
    }

    #[test]
    fn prop_transpose_twice_is_identity(rows in 1..16usize, cols in 1..16usize, seed in 0..100u64) {
        let t = matrix(rows, cols, seed);
        let tt = t.t().unwrap();
        prop_assert_eq!(tt.shape(), &[cols, rows][..]);
        prop_assert_eq!(tt.t().unwrap(), t);
    }

    #[test]
    fn prop_inverse_permutation_restores((t, axes) in tensor_and_axes()) {
        let mut inverse = vec![0; axes.len()];
        for (i, &ax) in axes.iter().enumerate() {
            inverse[ax] = i;
        }

        let moved = t.transpose(&axes).unwrap();
        prop_assert_eq!(moved.numel(), t.numel());
        for (i, &ax) in axes.iter().enumerate() {
            prop_assert_eq!(moved.shape()[i], t.shape()[ax]);
        }
        prop_assert_eq!(moved.transpose(&inverse).unwrap(), t);
    }

    #[test]
    fn prop_dot_identity(n in 1..10usize, cols in 1..10usize, seed in 0..1000u64) {
        let t = matrix(n, cols, seed);
        let mut eye = Tensor::make(&[n, n]).unwrap().into_data();
        for i in 0..n {
            eye[i * n + i] = 1.0;
        }
        let eye = Tensor::from_vec(eye, &[n, n]).unwrap();
        prop_assert_eq!(eye.dot(&t).unwrap(), t);
    }

    #[test]
    fn prop_sums_agree(rows in 1..10usize, cols in 1..10usize, seed in 0..1000u64) {
        // Integer-valued data, so both orders of summation are exact
        let t = matrix(rows, cols, seed);
        let by_rows: f64 = t.sum_rows().unwrap().data().iter().sum();
        let by_cols: f64 = t.sum_cols().unwrap().data().iter().sum();
        prop_assert_eq!(by_rows, by_cols);
    }

    #[test]
    fn prop_max_cols_dominates(rows in 1..10usize, cols in 1..10usize, seed in 0..1000u64) {
        let t = matrix(rows, cols, seed);
        let m = t.max_cols().unwrap();
        let idx = t.argmax_cols().unwrap();
        for r in 0..rows {
            let row_max = m.get(&[r, 0]).unwrap();
            prop_assert!(row_max >= 0.0);
            for c in 0..cols {
                prop_assert!(t.get(&[r, c]).unwrap() <= row_max);
                prop_assert_eq!(m.get(&[r, c]), Some(row_max));
            }
            let j = idx.get(r, 0).unwrap();
            if row_max > 0.0 {
                prop_assert_eq!(t.get(&[r, j]), Some(row_max));
            } else {
                prop_assert_eq!(j, 0);
            }
        }
    }

    #[test]
    fn prop_cast_replicates(len in 1..10usize, target in 1..10usize, seed in 0..1000u64) {
        let row = matrix(1, len, seed);
        let c = row.cast(target).unwrap();
        prop_assert_eq!(c.shape(), &[target, len][..]);
        for r in c.to_rows().unwrap() {
            prop_assert_eq!(&r[..], row.data());
        }
    }
}
