#[cfg(all(test, feature = "gpu"))]
mod gpu_tests {
    use ampere::{
        Backend, EngineConfig, GpuBackend, HostBackend, Residency, Tensor, init, is_gpu_available,
    };
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn gpu() -> Option<GpuBackend> {
        if !is_gpu_available() {
            println!("Skipping GPU test - no GPU available");
            return None;
        }
        let backend = GpuBackend::from_env().unwrap();
        println!("Running on {}", backend.device_name());
        Some(backend)
    }

    fn host() -> HostBackend {
        HostBackend::new(&EngineConfig::default()).unwrap()
    }

    fn seeded(seed: u64, rows: usize, cols: usize) -> Tensor {
        init::random_normal_with(&mut StdRng::seed_from_u64(seed), rows, cols, 1.0).unwrap()
    }

    fn assert_close(cpu: &Tensor, gpu: &Tensor, tol: f64, what: &str) {
        assert_eq!(cpu.shape(), gpu.shape(), "{what}: shape");
        for (i, (&c, &g)) in cpu.data().iter().zip(gpu.data()).enumerate() {
            assert!(
                (c - g).abs() <= tol * c.abs().max(1.0),
                "{what} mismatch at index {i}: cpu={c}, gpu={g}"
            );
        }
    }

    #[test]
    fn test_gpu_matmul_layouts() {
        let Some(gpu) = gpu() else { return };
        let cpu = host();
        let a = seeded(1, 37, 19);
        let b = seeded(2, 19, 23);
        let a_t = a.t().unwrap();
        let b_t = b.t().unwrap();

        let (da, db) = (gpu.upload(&a).unwrap(), gpu.upload(&b).unwrap());
        let (da_t, db_t) = (gpu.upload(&a_t).unwrap(), gpu.upload(&b_t).unwrap());

        let want = cpu.dot(&a, &b).unwrap();
        let nn = gpu.download(&gpu.dot(&da, &db).unwrap()).unwrap();
        let tn = gpu.download(&gpu.t_dot(&da_t, &db).unwrap()).unwrap();
        let nt = gpu.download(&gpu.dot_t(&da, &db_t).unwrap()).unwrap();
        assert_close(&want, &nn, 1e-3, "dot");
        assert_close(&want, &tn, 1e-3, "t_dot");
        assert_close(&want, &nt, 1e-3, "dot_t");
    }

    #[test]
    fn test_gpu_elementwise_matches_host() {
        let Some(gpu) = gpu() else { return };
        let cpu = host();
        let a = seeded(3, 16, 9);
        let b = seeded(4, 16, 9).affine(1.0, 3.0);
        let (da, db) = (gpu.upload(&a).unwrap(), gpu.upload(&b).unwrap());

        let cases: [(&str, Tensor, Tensor); 4] = [
            ("add", cpu.add(&a, &b).unwrap(), gpu.download(&gpu.add(&da, &db).unwrap()).unwrap()),
            ("sub", cpu.sub(&a, &b).unwrap(), gpu.download(&gpu.sub(&da, &db).unwrap()).unwrap()),
            ("mul", cpu.mul(&a, &b).unwrap(), gpu.download(&gpu.mul(&da, &db).unwrap()).unwrap()),
            ("div", cpu.div(&a, &b).unwrap(), gpu.download(&gpu.div(&da, &db).unwrap()).unwrap()),
        ];
        for (name, want, got) in &cases {
            assert_close(want, got, 1e-4, name);
        }

        let scaled = gpu.download(&gpu.mul_scalar(&da, 2.5).unwrap()).unwrap();
        assert_close(&cpu.mul_scalar(&a, 2.5).unwrap(), &scaled, 1e-4, "mul_scalar");
        let shifted = gpu.download(&gpu.add_scalar(&da, -1.0).unwrap()).unwrap();
        assert_close(&cpu.add_scalar(&a, -1.0).unwrap(), &shifted, 1e-4, "add_scalar");
    }

    #[test]
    fn test_gpu_unary_matches_host() {
        let Some(gpu) = gpu() else { return };
        let cpu = host();
        let a = seeded(5, 8, 8);
        let positive = a.mask().affine(1.0, 0.5);
        let (da, dp) = (gpu.upload(&a).unwrap(), gpu.upload(&positive).unwrap());

        let mask = gpu.download(&gpu.mask(&da).unwrap()).unwrap();
        assert_eq!(mask, cpu.mask(&a).unwrap());

        let affine = gpu.download(&gpu.affine(&da, -2.0, 0.25).unwrap()).unwrap();
        assert_close(&cpu.affine(&a, -2.0, 0.25).unwrap(), &affine, 1e-4, "affine");

        let exp = gpu.download(&gpu.exp_affine(&da, 0.5, -1.0).unwrap()).unwrap();
        assert_close(&cpu.exp_affine(&a, 0.5, -1.0).unwrap(), &exp, 1e-4, "exp_affine");

        let log = gpu.download(&gpu.log_shift(&dp, 1.0).unwrap()).unwrap();
        assert_close(&cpu.log_shift(&positive, 1.0).unwrap(), &log, 1e-4, "log_shift");
    }

    #[test]
    fn test_gpu_reductions_and_cast() {
        let Some(gpu) = gpu() else { return };
        let cpu = host();
        // Taller than one workgroup so the tree reduction loops
        let a = seeded(6, 300, 7);
        let da = gpu.upload(&a).unwrap();

        let rows = gpu.download(&gpu.sum_rows(&da).unwrap()).unwrap();
        assert_close(&cpu.sum_rows(&a).unwrap(), &rows, 1e-3, "sum_rows");
        let cols = gpu.download(&gpu.sum_cols(&da).unwrap()).unwrap();
        assert_close(&cpu.sum_cols(&a).unwrap(), &cols, 1e-3, "sum_cols");

        let row = Tensor::from_rows(&[[1.0, 2.0, 3.0]]).unwrap();
        let cast = gpu.download(&gpu.cast(&gpu.upload(&row).unwrap(), 4).unwrap()).unwrap();
        assert_eq!(cast, cpu.cast(&row, 4).unwrap());

        let col = Tensor::from_rows(&[[1.0], [2.0]]).unwrap();
        let cast = gpu.download(&gpu.cast(&gpu.upload(&col).unwrap(), 3).unwrap()).unwrap();
        assert_eq!(cast, cpu.cast(&col, 3).unwrap());
    }

    #[test]
    fn test_gpu_add_assign_invalidates_mirror() {
        let Some(gpu) = gpu() else { return };
        let x = Tensor::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let mut y = gpu.upload(&init::fill(2, 2, 10.0).unwrap()).unwrap();
        let dx = gpu.upload(&x).unwrap();

        assert_eq!(y.residency(), Residency::DeviceOnly);
        gpu.copy_to_host(&mut y).unwrap();
        assert_eq!(y.residency(), Residency::Mirrored);

        gpu.add_assign(&mut y, 0.5, &dx).unwrap();
        assert_eq!(y.residency(), Residency::DeviceOnly);
        let values = gpu.copy_to_host(&mut y).unwrap();
        assert_eq!(values.data(), &[10.5, 11.0, 11.5, 12.0]);
    }

    #[test]
    fn test_gpu_buffers_released_once() {
        let Some(gpu) = gpu() else { return };
        assert_eq!(gpu.live_buffers(), 0);
        let a = gpu.malloc(&[4, 4]).unwrap();
        let b = gpu.upload(&init::fill(4, 4, 1.0).unwrap()).unwrap();
        {
            let _c = gpu.add(&a, &b).unwrap();
            assert_eq!(gpu.live_buffers(), 3);
        }
        assert_eq!(gpu.live_buffers(), 2);

        gpu.release(a).unwrap();
        assert_eq!(gpu.live_buffers(), 1);
        drop(b);
        assert_eq!(gpu.live_buffers(), 0);
        gpu.sync().unwrap();
    }
}
