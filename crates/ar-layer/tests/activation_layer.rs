use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ar_layer::{Activation, ActivationKind, Layer, LayerConf, LayerError, Phase};
use ar_tensor::{default_backend, ComputeBackend, CpuBackend, Device, Shape, Tensor};

const TYPES: [&str; 3] = ["SIGMOID", "TANH", "RELU"];
const NEG_SLOPE: f32 = 0.5;

fn conf_for(layer_type: &str) -> LayerConf {
    let conf = LayerConf::new(layer_type);
    if layer_type == "RELU" {
        conf.with_negative_slope(NEG_SLOPE)
    } else {
        conf
    }
}

fn device_tensor(data: &[f32]) -> Tensor {
    Tensor::from_host(data, Shape::vector(data.len()), default_backend()).unwrap()
}

fn host() -> Arc<dyn ComputeBackend> {
    Arc::new(CpuBackend::new())
}

#[test]
fn setup() {
    let mut acti = Activation::new();
    assert_eq!(acti.layer_type(), "Activation");

    let conf = LayerConf::new("RELU").with_negative_slope(0.5);
    acti.setup(&Shape::vector(3), &conf).unwrap();
    acti.init_backend(3, ar_tensor::DType::F32).unwrap();
    assert_eq!(acti.kind(), Some(ActivationKind::Relu));
    assert_eq!(acti.negative_slope(), 0.5);
}

#[test]
fn forward() {
    let x = [1.0f32, 2.0, 3.0, -2.0, -3.0, -4.0];
    let n = x.len();
    let input = device_tensor(&x);

    for layer_type in TYPES {
        let mut acti = Activation::new();
        acti.setup(&Shape::vector(n), &conf_for(layer_type)).unwrap();

        let mut out = acti.forward(Phase::Train, &input).unwrap();
        assert_eq!(out.size(), n);
        assert_eq!(out.device(), input.device());

        out.to_device(host()).unwrap();
        assert_eq!(out.device(), Device::Cpu);
        let y = out.as_host_slice().unwrap();

        let expected: Vec<f32> = match acti.mode() {
            Some("SIGMOID") => x.iter().map(|v| 1.0 / (1.0 + (-v).exp())).collect(),
            Some("TANH") => x.iter().map(|v| v.tanh()).collect(),
            Some("RELU") => x.iter().map(|&v| if v >= 0.0 { v } else { 0.0 }).collect(),
            other => panic!("unknown activation: {:?}", other),
        };
        for i in [0, 4, 5] {
            assert_relative_eq!(expected[i], y[i], max_relative = 1e-6);
        }
    }
}

#[test]
fn forward_concrete_values() {
    let x = [1.0f32, 2.0, 3.0, -2.0, -3.0, -4.0];
    let mut sigmoid = Activation::with_kind(ActivationKind::Sigmoid).unwrap();
    let y = sigmoid
        .forward(Phase::Train, &device_tensor(&x))
        .unwrap()
        .to_host()
        .unwrap();
    assert_relative_eq!(y[0], 0.731_058_6, max_relative = 1e-6);
    assert_relative_eq!(y[4], 0.047_425_87, max_relative = 1e-6);
    assert_relative_eq!(y[5], 0.017_986_21, max_relative = 1e-6);
    assert!(y.iter().all(|&v| v > 0.0 && v < 1.0));

    let mut relu = Activation::new();
    relu.setup(&Shape::vector(x.len()), &conf_for("RELU")).unwrap();
    let y = relu
        .forward(Phase::Train, &device_tensor(&x))
        .unwrap()
        .to_host()
        .unwrap();
    assert_eq!(y, vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
}

#[test]
fn backward() {
    let x = [2.0f32, 3.0, 3.0, 7.0, 0.0, 5.0, 1.5, 2.5, -2.5, 1.5];
    let grad = [2.0f32, 1.0, 2.0, 0.0, -2.0, -1.0, 1.5, 2.5, -1.5, -2.5];
    let n = x.len();
    let input = device_tensor(&x);

    for layer_type in TYPES {
        let mut acti = Activation::new();
        acti.setup(&Shape::vector(n), &conf_for(layer_type)).unwrap();
        acti.init_backend(n, ar_tensor::DType::F32).unwrap();

        let out = acti.forward(Phase::Train, &input).unwrap();
        assert_eq!(out.size(), n);
        let y = out.to_host().unwrap();

        let out_diff = device_tensor(&grad);
        let (mut in_diff, params) = acti.backward(Phase::Train, &out_diff).unwrap();
        assert!(params.is_empty());
        in_diff.to_device(host()).unwrap();
        let dx_got = in_diff.as_host_slice().unwrap();

        let dx: Vec<f32> = match acti.mode() {
            Some("SIGMOID") => (0..n).map(|i| grad[i] * y[i] * (1.0 - y[i])).collect(),
            Some("TANH") => (0..n).map(|i| grad[i] * (1.0 - y[i] * y[i])).collect(),
            Some("RELU") => (0..n)
                .map(|i| if x[i] > 0.0 { grad[i] } else { 0.0 })
                .collect(),
            other => panic!("unknown activation: {:?}", other),
        };
        for i in 0..n {
            assert_abs_diff_eq!(dx[i], dx_got[i], epsilon = 1e-7);
        }
    }
}

#[test]
fn relu_backward_concrete_values() {
    let x = [2.0f32, 3.0, 3.0, 7.0, 0.0, 5.0, 1.5, 2.5, -2.5, 1.5];
    let grad = [2.0f32, 1.0, 2.0, 0.0, -2.0, -1.0, 1.5, 2.5, -1.5, -2.5];
    let mut relu = Activation::new();
    relu.setup(&Shape::vector(x.len()), &conf_for("RELU")).unwrap();
    relu.forward(Phase::Train, &device_tensor(&x)).unwrap();
    let (dx, _) = relu.backward(Phase::Train, &device_tensor(&grad)).unwrap();
    assert_eq!(
        dx.to_host().unwrap(),
        vec![2.0, 1.0, 2.0, 0.0, 0.0, -1.0, 1.5, 2.5, 0.0, -2.5]
    );
}

#[test]
fn leaky_relu_applies_slope_in_both_passes() {
    let x = [2.0f32, 0.0, -2.0, -4.0];
    let grad = [1.0f32, 1.0, 1.0, -2.0];
    let mut leaky = Activation::new();
    leaky
        .setup(
            &Shape::vector(x.len()),
            &LayerConf::new("LEAKY_RELU").with_negative_slope(NEG_SLOPE),
        )
        .unwrap();
    let y = leaky.forward(Phase::Train, &device_tensor(&x)).unwrap();
    assert_eq!(y.to_host().unwrap(), vec![2.0, 0.0, -1.0, -2.0]);
    let (dx, _) = leaky.backward(Phase::Train, &device_tensor(&grad)).unwrap();
    assert_eq!(dx.to_host().unwrap(), vec![1.0, 0.5, 0.5, -1.0]);
}

#[test]
fn backward_is_repeatable() {
    let mut acti = Activation::with_kind(ActivationKind::Tanh).unwrap();
    acti.forward(Phase::Train, &device_tensor(&[0.3, -0.7, 1.2]))
        .unwrap();
    let grad = device_tensor(&[1.0, 2.0, -1.0]);
    let (a, _) = acti.backward(Phase::Train, &grad).unwrap();
    let (b, _) = acti.backward(Phase::Train, &grad).unwrap();
    assert_eq!(a.to_host().unwrap(), b.to_host().unwrap());
    assert!(acti.is_forwarded());
}

#[test]
fn reconfigure_is_deterministic() {
    let x = device_tensor(&[-1.5, -0.25, 0.0, 0.75, 4.0]);
    let mut acti = Activation::with_kind(ActivationKind::Sigmoid).unwrap();
    let first = acti.forward(Phase::Train, &x).unwrap().to_host().unwrap();
    acti.configure(ActivationKind::Sigmoid).unwrap();
    let second = acti.forward(Phase::Train, &x).unwrap().to_host().unwrap();
    assert_eq!(first, second);
}

#[test]
fn backward_before_forward_fails() {
    let mut acti = Activation::new();
    acti.setup(&Shape::vector(2), &conf_for("RELU")).unwrap();
    assert!(matches!(
        acti.backward(Phase::Train, &device_tensor(&[1.0, 1.0])),
        Err(LayerError::MissingForward)
    ));
}
