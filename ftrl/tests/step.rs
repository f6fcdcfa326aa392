use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
    },
    thread,
};

use ftrl::{
    Ack, Ftrl, FtrlBuilder, FtrlConfig, FtrlErr, Gradient, LearningRate, LearningRateSpec,
    NoServer, Parameter, PsTransport, PushRequest, RemoteErr, Tensor,
};

fn config(learning_rate: f32, lr_power: f32) -> FtrlConfig {
    FtrlConfig {
        learning_rate: LearningRateSpec::Static(learning_rate),
        lr_power,
        ..Default::default()
    }
}

/// Acknowledges every push and refuses every pull.
#[derive(Default)]
struct PullRefused {
    pushes: AtomicUsize,
}

impl PsTransport for PullRefused {
    async fn push(&self, req: PushRequest<'_>) -> Result<Ack, RemoteErr> {
        let seq = self.pushes.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(Ack {
            key: req.key.clone(),
            seq,
        })
    }

    async fn pull(&self, _ack: Ack, out: &mut [f32]) -> Result<(), RemoteErr> {
        out.fill(f32::NAN);
        Err(RemoteErr::new("connection reset"))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn scalar_step_matches_hand_computed_values() {
    let w = Parameter::new("w", Tensor::scalar(0.));
    let mut ftrl = Ftrl::new(vec![w.clone()], config(0.1, -0.5), NoServer).unwrap();

    let ok = ftrl.step(vec![Tensor::scalar(1.).into()]).await.unwrap();
    assert!(ok);

    let acc = ftrl.accumulators("w").unwrap();
    assert!((acc.moment().as_slice()[0] - 1.1).abs() < 1e-6);
    assert!((acc.linear().as_slice()[0] - 1.).abs() < 1e-6);
    assert!((w.read()[0] - -0.0953).abs() < 1e-4);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeating_a_gradient_keeps_moving_the_weights() {
    let w = Parameter::new("w", Tensor::full([3], 0.));
    let mut ftrl = Ftrl::new(vec![w.clone()], config(0.1, -0.5), NoServer).unwrap();
    let grad = Gradient::Dense(Tensor::new([3], vec![1., -0.5, 0.25]).unwrap());

    ftrl.step(vec![grad.clone()]).await.unwrap();
    let first = w.to_tensor();
    ftrl.step(vec![grad]).await.unwrap();

    assert_ne!(w.to_tensor(), first);
}

#[tokio::test(flavor = "multi_thread")]
async fn fixed_rate_accumulates_raw_gradients() {
    let w = Parameter::new("w", Tensor::full([2], 0.7));
    let mut ftrl = Ftrl::new(vec![w], config(0.3, 0.), NoServer).unwrap();

    let grad = Gradient::Dense(Tensor::new([2], vec![0.5, -2.]).unwrap());
    ftrl.step(vec![grad.clone()]).await.unwrap();
    ftrl.step(vec![grad]).await.unwrap();

    let acc = ftrl.accumulators("w").unwrap();
    assert_eq!(acc.linear().as_slice(), &[1., -4.]);
    assert!((acc.moment().as_slice()[1] - 8.1).abs() < 1e-5);
}

#[tokio::test(flavor = "multi_thread")]
async fn sparse_step_only_touches_named_rows() {
    let init: Vec<f32> = (0..12).map(|i| i as f32 * 0.37 - 2.).collect();
    let emb = Parameter::new("emb", Tensor::new([4, 3], init.clone()).unwrap());
    let mut ftrl = Ftrl::new(vec![emb.clone()], config(0.05, -0.5), NoServer).unwrap();

    let values = Tensor::new([3, 3], vec![1., 2., 3., -1., 0.5, 0., 4., 4., 4.]).unwrap();
    let grad = Gradient::sparse(vec![2, 0, 2], values).unwrap();
    assert!(ftrl.step(vec![grad]).await.unwrap());

    let after = emb.to_tensor();
    let acc = ftrl.accumulators("emb").unwrap();

    for row in [1, 3] {
        let range = row * 3..row * 3 + 3;
        assert_eq!(after.as_slice()[range.clone()], init[range.clone()]);
        assert_eq!(acc.moment().as_slice()[range.clone()], [0.1; 3]);
        assert_eq!(acc.linear().as_slice()[range], [0.; 3]);
    }

    // Row 2 received two rows of gradients.
    assert!((acc.moment().as_slice()[6] - (0.1 + 1. + 16.)).abs() < 1e-5);
}

#[tokio::test]
async fn current_thread_runtime_runs_local_updates() {
    let w = Parameter::new("w", Tensor::scalar(0.));
    let emb = Parameter::new("emb", Tensor::full([3, 2], 0.));
    let mut ftrl = Ftrl::new(vec![w.clone(), emb.clone()], config(0.1, -0.5), NoServer).unwrap();

    let grads = vec![
        Tensor::scalar(1.).into(),
        Gradient::sparse(vec![1], Tensor::full([1, 2], 1.)).unwrap(),
    ];
    assert!(ftrl.step(grads).await.unwrap());

    assert!((w.read()[0] - -0.0953).abs() < 1e-4);
    let emb = emb.to_tensor();
    assert_eq!(&emb.as_slice()[..2], &[0.; 2]);
    assert!((emb.as_slice()[2] - -0.0953).abs() < 1e-4);
}

#[tokio::test(flavor = "multi_thread")]
async fn dense_and_sparse_parameters_update_in_the_same_step() {
    let dense = Parameter::new("dense", Tensor::full([2, 2], 0.));
    let sparse = Parameter::new("sparse", Tensor::full([2, 2], 0.));
    let params = vec![dense.clone(), sparse.clone()];
    let mut ftrl = Ftrl::new(params, config(0.1, -0.5), NoServer).unwrap();

    let grads = vec![
        Gradient::Dense(Tensor::full([2, 2], 1.)),
        Gradient::sparse(vec![0], Tensor::full([1, 2], 1.)).unwrap(),
    ];
    assert!(ftrl.step(grads).await.unwrap());

    let dense_acc = ftrl.accumulators("dense").unwrap();
    assert_eq!(dense_acc.linear().as_slice(), &[1.; 4]);

    let sparse_acc = ftrl.accumulators("sparse").unwrap();
    assert_eq!(sparse_acc.linear().as_slice(), &[1., 1., 0., 0.]);
    assert_eq!(&sparse.to_tensor().as_slice()[2..], &[0.; 2]);
}

/// Reports a static rate read from shared state that tests can change between steps.
struct SharedLr(Arc<AtomicU32>);

impl SharedLr {
    fn new(learning_rate: f32) -> (Self, Arc<AtomicU32>) {
        let bits = Arc::new(AtomicU32::new(learning_rate.to_bits()));
        (Self(bits.clone()), bits)
    }
}

impl LearningRate for SharedLr {
    fn learning_rate(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::SeqCst))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_per_step_learning_rate_fails_before_any_update() {
    let w = Parameter::new("w", Tensor::full([2], 1.));
    let (provider, bits) = SharedLr::new(0.1);
    let mut ftrl = FtrlBuilder::new(FtrlConfig::default())
        .learning_rate(provider)
        .build(vec![w.clone()], NoServer)
        .unwrap();

    for bad in [f32::NAN, -0.1, f32::INFINITY] {
        bits.store(bad.to_bits(), Ordering::SeqCst);
        let res = ftrl.step(vec![Gradient::Dense(Tensor::full([2], 1.))]).await;

        assert!(matches!(
            res,
            Err(FtrlErr::InvalidHyperparameter { name: "learning_rate", .. })
        ));
        assert_eq!(w.to_tensor(), Tensor::full([2], 1.));
        assert_eq!(ftrl.accumulators("w").unwrap().linear().as_slice(), &[0.; 2]);
    }

    bits.store(0.1f32.to_bits(), Ordering::SeqCst);
    assert!(ftrl.step(vec![Gradient::Dense(Tensor::full([2], 1.))]).await.unwrap());
    assert_ne!(w.to_tensor(), Tensor::full([2], 1.));
}

#[tokio::test(flavor = "multi_thread")]
async fn shape_errors_leave_every_parameter_untouched() {
    let a = Parameter::new("a", Tensor::full([2], 1.));
    let b = Parameter::new("b", Tensor::full([3, 2], 1.));
    let mut ftrl = Ftrl::new(vec![a.clone(), b.clone()], config(0.1, -0.5), NoServer).unwrap();

    let grads = vec![
        Gradient::Dense(Tensor::full([2], 1.)),
        Gradient::sparse(vec![0, 3], Tensor::full([2, 2], 1.)).unwrap(),
    ];
    let res = ftrl.step(grads).await;

    assert!(matches!(res, Err(FtrlErr::IndexOutOfBounds { index: 3, .. })));
    assert_eq!(a.to_tensor(), Tensor::full([2], 1.));
    assert_eq!(b.to_tensor(), Tensor::full([3, 2], 1.));
    assert_eq!(ftrl.accumulators("a").unwrap().linear().as_slice(), &[0.; 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn gradient_count_must_match_bound_parameters() {
    let a = Parameter::new("a", Tensor::full([2], 1.));
    let mut ftrl = Ftrl::new(vec![a], FtrlConfig::default(), NoServer).unwrap();

    let res = ftrl.step(Vec::new()).await;

    assert!(matches!(
        res,
        Err(FtrlErr::GradientCount {
            got: 0,
            expected: 1
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_pull_reports_false_and_keeps_local_weights() {
    let local = Parameter::new("local", Tensor::full([2], 0.));
    let remote = Parameter::server_resident("remote", Tensor::full([2], 0.5));
    let params = vec![local.clone(), remote.clone()];
    let mut ftrl = Ftrl::new(params, config(0.1, -0.5), PullRefused::default()).unwrap();

    let grads = vec![
        Gradient::Dense(Tensor::full([2], 1.)),
        Gradient::Dense(Tensor::full([2], 1.)),
    ];
    let ok = ftrl.step(grads).await.unwrap();

    assert!(!ok);
    assert_eq!(ftrl.transport().pushes.load(Ordering::SeqCst), 1);
    assert_eq!(remote.to_tensor(), Tensor::full([2], 0.5));
    assert_ne!(local.to_tensor(), Tensor::full([2], 0.));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_resident_parameters_keep_initial_local_accumulators() {
    let remote = Parameter::server_resident("remote", Tensor::full([2], 0.));
    let mut ftrl = Ftrl::new(vec![remote], FtrlConfig::default(), NoServer).unwrap();

    let ok = ftrl
        .step(vec![Gradient::Dense(Tensor::full([2], 1.))])
        .await
        .unwrap();

    assert!(!ok);
    assert_eq!(ftrl.route_key("remote").unwrap().to_string(), "ftrl/remote");
    let acc = ftrl.accumulators("remote").unwrap();
    assert_eq!(acc.moment().as_slice(), &[0.1; 2]);
    assert_eq!(acc.linear().as_slice(), &[0.; 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn weight_decay_and_loss_scale_are_applied_before_the_update() {
    let decayed = Parameter::new("w", Tensor::full([1], 2.));
    let cfg = FtrlConfig {
        weight_decay: 0.5,
        loss_scale: 4.,
        ..config(0.1, 0.)
    };
    let mut ftrl = Ftrl::new(vec![decayed], cfg, NoServer).unwrap();

    ftrl.step(vec![Gradient::Dense(Tensor::full([1], 3.))])
        .await
        .unwrap();

    // (3 + 0.5 * 2) / 4
    let acc = ftrl.accumulators("w").unwrap();
    assert!((acc.linear().as_slice()[0] - 1.).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn locked_updates_are_never_observed_halfway() {
    const NUMEL: usize = 1 << 16;

    let w = Parameter::new("w", Tensor::full([NUMEL], 0.));
    let cfg = FtrlConfig {
        use_locking: true,
        ..config(0.1, -0.5)
    };
    let mut ftrl = Ftrl::new(vec![w.clone()], cfg, NoServer).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let (w, done) = (w.clone(), done.clone());
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                let weights = w.read();
                assert!(weights.iter().all(|&x| x == weights[0]));
            }
        })
    };

    for _ in 0..5 {
        let grad = Gradient::Dense(Tensor::full([NUMEL], 1.));
        assert!(ftrl.step(vec![grad]).await.unwrap());
    }

    done.store(true, Ordering::Relaxed);
    reader.join().unwrap();
}

#[test]
fn duplicate_parameter_names_are_rejected() {
    let params = vec![
        Parameter::new("w", Tensor::scalar(0.)),
        Parameter::new("w", Tensor::scalar(1.)),
    ];

    let res = Ftrl::new(params, FtrlConfig::default(), NoServer);
    assert!(matches!(res, Err(FtrlErr::DuplicateParameter { .. })));
}

#[test]
fn invalid_configurations_are_rejected_at_construction() {
    let params = || vec![Parameter::new("w", Tensor::scalar(0.))];

    for cfg in [
        FtrlConfig {
            initial_accum: -0.1,
            ..Default::default()
        },
        FtrlConfig {
            lr_power: 0.1,
            ..Default::default()
        },
        FtrlConfig {
            l1: -1.,
            ..Default::default()
        },
    ] {
        let res = Ftrl::new(params(), cfg, NoServer);
        assert!(matches!(res, Err(FtrlErr::InvalidHyperparameter { .. })));
    }

    let res = FtrlConfig::from_json(r#"{ "use_locking": "yes" }"#);
    assert!(matches!(res, Err(FtrlErr::Config(_))));
}

#[test]
fn dynamic_learning_rate_providers_are_rejected() {
    struct Warmup;

    impl LearningRate for Warmup {
        fn learning_rate(&self) -> f32 {
            0.01
        }

        fn is_dynamic(&self) -> bool {
            true
        }
    }

    let params = vec![Parameter::new("w", Tensor::scalar(0.))];
    let res = FtrlBuilder::new(FtrlConfig::default())
        .learning_rate(Warmup)
        .build(params, NoServer);

    assert!(matches!(res, Err(FtrlErr::UnsupportedLearningRate("dynamic"))));
}
