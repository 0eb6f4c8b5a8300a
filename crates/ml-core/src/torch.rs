use std::{convert::TryFrom, fs, path::Path, sync::Mutex};

use anyhow::{Context, anyhow, bail};
use tch::{self, Device, Kind, Tensor};
use tracing::debug;
use video_ingest::{Frame, FrameFormat};

use crate::classifier::{Classification, ClassifyError, Classifier};

const IMAGENET_MEAN: [f64; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f64; 3] = [0.229, 0.224, 0.225];

/// TorchScript-backed image classifier.
///
/// The module is expected to take a `[1, 3, H, W]` float tensor and return
/// `[1, N]` logits, one per line of the label file.
pub struct TorchClassifier {
    module: Mutex<tch::CModule>,
    device: Device,
    input_size: (i64, i64),
    labels: Vec<String>,
    top_k: i64,
}

impl TorchClassifier {
    /// Load the module and its label file. Failing here is a startup error.
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(
        model_path: P,
        labels_path: L,
        device: Device,
        input_size: (i64, i64),
    ) -> Result<Self, ClassifyError> {
        let model_path = model_path.as_ref();
        let module = tch::CModule::load_on_device(model_path, device).map_err(|err| {
            ClassifyError::ModelLoad {
                path: model_path.to_path_buf(),
                source: err.into(),
            }
        })?;
        let labels = read_labels(labels_path.as_ref()).map_err(|source| ClassifyError::ModelLoad {
            path: labels_path.as_ref().to_path_buf(),
            source,
        })?;
        debug!(
            "Loaded classifier {} ({} labels) on {:?}",
            model_path.display(),
            labels.len(),
            device
        );
        Ok(Self {
            module: Mutex::new(module),
            device,
            input_size,
            labels,
            top_k: 5,
        })
    }

    /// Override how many ranked entries each call returns.
    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

/// Converts a frame of any size into the normalized RGB NCHW tensor the
/// module expects.
///
/// The largest centered square is cropped out of the frame and resized
/// bilinearly to `input_size` (`(width, height)`).
pub fn prepare_input(
    frame: &Frame,
    input_size: (i64, i64),
    device: Device,
) -> Result<Tensor, ClassifyError> {
    if !frame.is_well_formed() {
        return Err(ClassifyError::UnsupportedFrame(format!(
            "{}x{} frame holds {} bytes, expected {}",
            frame.width,
            frame.height,
            frame.data.len(),
            frame.expected_len()
        )));
    }
    let (in_w, in_h) = input_size;
    let (width, height) = (frame.width as i64, frame.height as i64);

    let channels = frame.format.bytes_per_pixel() as i64;
    let pixels = Tensor::from_slice(&frame.data)
        .to_device(device)
        .to_kind(Kind::Float)
        .view([1, height, width, channels])
        .narrow(3, 0, 3);
    let rgb = match frame.format {
        FrameFormat::Bgr8 => pixels.flip([3]),
        FrameFormat::Rgba8 => pixels,
    };
    let nchw = rgb.permute([0, 3, 1, 2]) / 255.0;

    let side = width.min(height);
    let square = nchw
        .narrow(2, (height - side) / 2, side)
        .narrow(3, (width - side) / 2, side);
    let resized = square.upsample_bilinear2d([in_h, in_w], false, None::<f64>, None::<f64>);

    let mean = Tensor::from_slice(&IMAGENET_MEAN)
        .to_kind(Kind::Float)
        .to_device(device)
        .view([1, 3, 1, 1]);
    let std = Tensor::from_slice(&IMAGENET_STD)
        .to_kind(Kind::Float)
        .to_device(device)
        .view([1, 3, 1, 1]);
    Ok((resized - mean) / std)
}

impl Classifier for TorchClassifier {
    fn classify(&self, frame: &Frame) -> Result<Vec<Classification>, ClassifyError> {
        let input = prepare_input(frame, self.input_size, self.device)?;
        let logits = {
            let module = self
                .module
                .lock()
                .map_err(|_| anyhow!("classifier module poisoned"))?;
            module.forward_ts(&[input]).context("classifier forward pass failed")?
        };

        let shape = logits.size();
        if shape.len() != 2 || shape[0] != 1 {
            return Err(anyhow!("unexpected classifier output shape: {shape:?}").into());
        }
        let classes = shape[1];
        if classes as usize != self.labels.len() {
            return Err(anyhow!(
                "classifier produced {classes} classes but {} labels are loaded",
                self.labels.len()
            )
            .into());
        }

        let probabilities = logits
            .softmax(-1, Kind::Float)
            .squeeze_dim(0)
            .to_device(Device::Cpu);
        let k = self.top_k.min(classes);
        let (values, indices) = probabilities.topk(k, -1, true, true);
        let values = Vec::<f32>::try_from(&values).context("reading top-k scores")?;
        let indices = Vec::<i64>::try_from(&indices).context("reading top-k indices")?;

        Ok(indices
            .into_iter()
            .zip(values)
            .filter_map(|(index, confidence)| {
                self.labels
                    .get(index as usize)
                    .map(|label| Classification::new(label.clone(), confidence))
            })
            .collect())
    }
}

fn read_labels(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read label file {}", path.display()))?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        bail!("label file {} is empty", path.display());
    }
    Ok(labels)
}
