//! ResNet-18 grading network on libtorch.
//!
//! Parameter paths mirror torchvision's state-dict names (`layer1.0.conv1.weight`,
//! `layer2.0.downsample.1.running_mean`, `fc.bias`, ...), so a checkpoint saved
//! with `torch.save(model.state_dict(), ...)` loads without conversion.

use std::path::Path;

use tch::nn::{self, ModuleT};
use tch::{Device, Kind, Tensor};

use crate::common::error::{GradeError, GradeResult};

use super::domain::{Classifier, ImageTensor};

const STAGES: [(i64, i64); 4] = [(64, 1), (128, 2), (256, 2), (512, 2)];
const BLOCKS_PER_STAGE: i64 = 2;

/// Parse a `DEVICE` selector: `cpu`, `cuda`, `cuda:N` or `mps`.
pub fn parse_device(selector: &str) -> GradeResult<Device> {
    let selector = selector.trim().to_ascii_lowercase();
    match selector.as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Ok(Device::Cuda(0)),
        "mps" => Ok(Device::Mps),
        other => other
            .strip_prefix("cuda:")
            .and_then(|idx| idx.parse::<usize>().ok())
            .map(Device::Cuda)
            .ok_or_else(|| GradeError::config(format!("unsupported DEVICE {other:?}"))),
    }
}

fn conv(p: nn::Path, c_in: i64, c_out: i64, ksize: i64, padding: i64, stride: i64) -> nn::Conv2D {
    let cfg = nn::ConvConfig {
        stride,
        padding,
        bias: false,
        ..Default::default()
    };
    nn::conv2d(p, c_in, c_out, ksize, cfg)
}

#[derive(Debug)]
struct BasicBlock {
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    conv2: nn::Conv2D,
    bn2: nn::BatchNorm,
    downsample: Option<(nn::Conv2D, nn::BatchNorm)>,
}

impl BasicBlock {
    fn new(p: nn::Path, c_in: i64, c_out: i64, stride: i64) -> Self {
        let downsample = (stride != 1 || c_in != c_out).then(|| {
            (
                conv(&p / "downsample" / 0, c_in, c_out, 1, 0, stride),
                nn::batch_norm2d(&p / "downsample" / 1, c_out, Default::default()),
            )
        });
        Self {
            conv1: conv(&p / "conv1", c_in, c_out, 3, 1, stride),
            bn1: nn::batch_norm2d(&p / "bn1", c_out, Default::default()),
            conv2: conv(&p / "conv2", c_out, c_out, 3, 1, 1),
            bn2: nn::batch_norm2d(&p / "bn2", c_out, Default::default()),
            downsample,
        }
    }

    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let ys = xs
            .apply(&self.conv1)
            .apply_t(&self.bn1, train)
            .relu()
            .apply(&self.conv2)
            .apply_t(&self.bn2, train);
        let shortcut = match &self.downsample {
            Some((conv, bn)) => xs.apply(conv).apply_t(bn, train),
            None => xs.shallow_clone(),
        };
        (ys + shortcut).relu()
    }
}

/// ResNet-18 with a `num_classes`-way head, fixed to evaluation mode.
#[derive(Debug)]
pub struct KneeResNet {
    conv1: nn::Conv2D,
    bn1: nn::BatchNorm,
    layers: Vec<Vec<BasicBlock>>,
    fc: nn::Linear,
    device: Device,
}

impl KneeResNet {
    fn new(root: &nn::Path, num_classes: i64, device: Device) -> Self {
        let mut c_in = 64;
        let layers = STAGES
            .iter()
            .enumerate()
            .map(|(i, &(c_out, stride))| {
                let stage = root / format!("layer{}", i + 1);
                (0..BLOCKS_PER_STAGE)
                    .map(|b| {
                        let block = BasicBlock::new(
                            &stage / b,
                            c_in,
                            c_out,
                            if b == 0 { stride } else { 1 },
                        );
                        c_in = c_out;
                        block
                    })
                    .collect()
            })
            .collect();

        Self {
            conv1: conv(root / "conv1", 3, 64, 7, 3, 2),
            bn1: nn::batch_norm2d(root / "bn1", 64, Default::default()),
            layers,
            fc: nn::linear(root / "fc", 512, num_classes, Default::default()),
            device,
        }
    }
}

impl ModuleT for KneeResNet {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let mut ys = xs
            .apply(&self.conv1)
            .apply_t(&self.bn1, train)
            .relu()
            .max_pool2d([3, 3], [2, 2], [1, 1], [1, 1], false);
        for stage in &self.layers {
            for block in stage {
                ys = block.forward_t(&ys, train);
            }
        }
        ys.adaptive_avg_pool2d([1, 1]).flat_view().apply(&self.fc)
    }
}

impl Classifier for KneeResNet {
    fn logits(&self, input: &ImageTensor) -> GradeResult<Vec<f32>> {
        let xs = Tensor::from_slice(&input.data)
            .view(input.batch_shape())
            .to_device(self.device);
        let out = tch::no_grad(|| self.forward_t(&xs, false));
        let out = out
            .squeeze_dim(0)
            .to_kind(Kind::Float)
            .to_device(Device::Cpu);
        Vec::<f32>::try_from(&out).map_err(|e| GradeError::Inference(e.to_string()))
    }
}

/// Build the architecture on `device` and fill it from the weight file.
pub fn load(weights: &Path, device: Device, num_classes: usize) -> GradeResult<KneeResNet> {
    let shown = weights.display().to_string();
    if !weights.is_file() {
        return Err(GradeError::load(shown, "file not found"));
    }

    let mut vs = nn::VarStore::new(device);
    let net = KneeResNet::new(&vs.root(), num_classes as i64, device);
    vs.load(weights).map_err(|e| GradeError::load(&shown, e))?;
    vs.freeze();

    tracing::info!(ev = "weights_loaded", path = %shown, device = ?device);
    Ok(net)
}
