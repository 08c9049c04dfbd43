// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Named server-side operations
//
// Every filter or transform the backend offers is one OperationKind. Each kind
// resolves to exactly one endpoint suffix under /processes/defined/ and builds
// its own JSON payload. No pixel work happens on the client.

use crate::types::AppError;
use serde_json::{json, Value};
use std::collections::HashSet;

/// What the face operation does with detected faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceMode {
    /// Pixelate detected faces
    Censor,
    /// Keep only the detected faces
    Isolate,
}

impl FaceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Censor => "censor",
            Self::Isolate => "isolate",
        }
    }
}

/// Parameter-free tag for every operation in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Grayscale,
    Negative,
    Sepia,
    Cartoon,
    PencilSketch,
    SkinWhitening,
    Heat,
    Pixelate,
    BackgroundRemove,
    Flip,
    Blur,
    CannyEdge,
    RgbBoost,
    BrightnessContrast,
    Rescale,
    Translate,
    Rotate,
    CardinalScale,
    Crop,
    FaceCensor,
    FaceIsolate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 21] = [
        Self::Grayscale,
        Self::Negative,
        Self::Sepia,
        Self::Cartoon,
        Self::PencilSketch,
        Self::SkinWhitening,
        Self::Heat,
        Self::Pixelate,
        Self::BackgroundRemove,
        Self::Flip,
        Self::Blur,
        Self::CannyEdge,
        Self::RgbBoost,
        Self::BrightnessContrast,
        Self::Rescale,
        Self::Translate,
        Self::Rotate,
        Self::CardinalScale,
        Self::Crop,
        Self::FaceCensor,
        Self::FaceIsolate,
    ];

    /// Stable machine name, used by the CLI and in logs
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Negative => "negative",
            Self::Sepia => "sepia",
            Self::Cartoon => "cartoon",
            Self::PencilSketch => "pencil-sketch",
            Self::SkinWhitening => "skin-whitening",
            Self::Heat => "heat",
            Self::Pixelate => "pixelate",
            Self::BackgroundRemove => "background-remove",
            Self::Flip => "flip",
            Self::Blur => "blur",
            Self::CannyEdge => "canny-edge",
            Self::RgbBoost => "rgb-boost",
            Self::BrightnessContrast => "brightness-contrast",
            Self::Rescale => "rescale",
            Self::Translate => "translate",
            Self::Rotate => "rotate",
            Self::CardinalScale => "cardinal-scale",
            Self::Crop => "crop",
            Self::FaceCensor => "face-censor",
            Self::FaceIsolate => "face-isolate",
        }
    }

    /// Route fragment appended to `/processes/defined/`
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Negative => "negative",
            Self::Sepia => "sepia_filter",
            Self::Cartoon => "cartoon_filter",
            Self::PencilSketch => "pencil_sketch_filter",
            Self::SkinWhitening => "skin_Whitening",
            Self::Heat => "heat",
            Self::Pixelate => "pixelate",
            Self::BackgroundRemove => "bg_remove",
            Self::Flip => "flip",
            Self::Blur => "blur",
            Self::CannyEdge => "canny",
            Self::RgbBoost => "rgb_boost",
            Self::BrightnessContrast => "brightness_contrast",
            Self::Rescale => "rescale",
            Self::Translate => "translate",
            Self::Rotate => "rotate",
            Self::CardinalScale => "cardinal_scale",
            Self::Crop => "crop",
            Self::FaceCensor | Self::FaceIsolate => "face",
        }
    }

    /// Human-facing label shown in the tool picker
    pub fn label(&self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale (Preto e Branco)",
            Self::Negative => "Filtro de Inversão (Negative)",
            Self::Sepia => "Sepia",
            Self::Cartoon => "Filtro de Cartoon",
            Self::PencilSketch => "Filtro de Desenho a Lápis",
            Self::SkinWhitening => "Filtro de Clareamento de Pele",
            Self::Heat => "Filtro de Calor (Thermal)",
            Self::Pixelate => "Pixelização Total",
            Self::BackgroundRemove => "Remove Background",
            Self::Flip => "Flip X",
            Self::Blur => "Blur",
            Self::CannyEdge => "Detecção de Bordas (Canny)",
            Self::RgbBoost => "Filtro de Cor Personalizada (RGB Boost)",
            Self::BrightnessContrast => "Filtro de Brilho e Contraste",
            Self::Rescale => "Resize",
            Self::Translate => "Translação (warpAffine)",
            Self::Rotate => "Rotação",
            Self::CardinalScale => "Escala (Cardinal)",
            Self::Crop => "Cropping",
            Self::FaceCensor => "Pixelização facial",
            Self::FaceIsolate => "Detecção de Rostos com IA",
        }
    }

    /// Names of the numeric parameters, in call order
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Self::Blur | Self::CannyEdge | Self::BrightnessContrast => &["amount"],
            Self::RgbBoost => &["red", "green", "blue"],
            Self::Rescale => &["factor"],
            Self::Translate => &["dx", "dy"],
            Self::Rotate => &["angle"],
            Self::CardinalScale => &["sx", "sy"],
            Self::Crop => &["x", "y", "width", "height"],
            _ => &[],
        }
    }

    pub fn arity(&self) -> usize {
        self.param_names().len()
    }

    /// Resolve a slug, endpoint suffix or display label (case-insensitive)
    pub fn lookup(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        let as_slug = wanted.replace(['_', ' '], "-");

        Self::ALL.iter().copied().find(|kind| {
            kind.slug() == as_slug
                || kind.label().to_lowercase() == wanted
                || (kind.endpoint().to_lowercase() == wanted && !kind.shares_endpoint())
        })
    }

    fn shares_endpoint(&self) -> bool {
        self.payload_tag().is_some()
    }

    /// Payload value that separates kinds sharing one endpoint
    fn payload_tag(&self) -> Option<&'static str> {
        match self {
            Self::FaceCensor => Some(FaceMode::Censor.as_str()),
            Self::FaceIsolate => Some(FaceMode::Isolate.as_str()),
            _ => None,
        }
    }

    /// Bind parameters, checking arity and finiteness
    pub fn build(self, params: &[f64]) -> Result<Operation, AppError> {
        if params.len() != self.arity() {
            return Err(AppError::Validation(format!(
                "{} expects {} parameter(s) ({}), got {}",
                self.slug(),
                self.arity(),
                self.param_names().join(", "),
                params.len()
            )));
        }
        if let Some(bad) = params.iter().find(|p| !p.is_finite()) {
            return Err(AppError::Validation(format!(
                "{} parameters must be finite numbers, got {}",
                self.slug(),
                bad
            )));
        }

        let p = |i: usize| params[i];
        let op = match self {
            Self::Grayscale => Operation::Grayscale,
            Self::Negative => Operation::Negative,
            Self::Sepia => Operation::Sepia,
            Self::Cartoon => Operation::Cartoon,
            Self::PencilSketch => Operation::PencilSketch,
            Self::SkinWhitening => Operation::SkinWhitening,
            Self::Heat => Operation::Heat,
            Self::Pixelate => Operation::Pixelate,
            Self::BackgroundRemove => Operation::BackgroundRemove,
            Self::Flip => Operation::Flip,
            Self::Blur => Operation::Blur { amount: p(0) },
            Self::CannyEdge => Operation::CannyEdge { amount: p(0) },
            Self::RgbBoost => Operation::RgbBoost {
                red: p(0),
                green: p(1),
                blue: p(2),
            },
            Self::BrightnessContrast => Operation::BrightnessContrast { amount: p(0) },
            Self::Rescale => Operation::Rescale { factor: p(0) },
            Self::Translate => Operation::Translate { dx: p(0), dy: p(1) },
            Self::Rotate => Operation::Rotate { angle: p(0) },
            Self::CardinalScale => Operation::CardinalScale { sx: p(0), sy: p(1) },
            Self::Crop => Operation::Crop {
                x: p(0),
                y: p(1),
                width: p(2),
                height: p(3),
            },
            Self::FaceCensor => Operation::Face {
                mode: FaceMode::Censor,
            },
            Self::FaceIsolate => Operation::Face {
                mode: FaceMode::Isolate,
            },
        };
        Ok(op)
    }
}

/// A fully parameterised request for one server-side operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Grayscale,
    Negative,
    Sepia,
    Cartoon,
    PencilSketch,
    SkinWhitening,
    Heat,
    Pixelate,
    BackgroundRemove,
    Flip,
    Blur { amount: f64 },
    CannyEdge { amount: f64 },
    RgbBoost { red: f64, green: f64, blue: f64 },
    BrightnessContrast { amount: f64 },
    Rescale { factor: f64 },
    Translate { dx: f64, dy: f64 },
    Rotate { angle: f64 },
    CardinalScale { sx: f64, sy: f64 },
    Crop { x: f64, y: f64, width: f64, height: f64 },
    Face { mode: FaceMode },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Grayscale => OperationKind::Grayscale,
            Self::Negative => OperationKind::Negative,
            Self::Sepia => OperationKind::Sepia,
            Self::Cartoon => OperationKind::Cartoon,
            Self::PencilSketch => OperationKind::PencilSketch,
            Self::SkinWhitening => OperationKind::SkinWhitening,
            Self::Heat => OperationKind::Heat,
            Self::Pixelate => OperationKind::Pixelate,
            Self::BackgroundRemove => OperationKind::BackgroundRemove,
            Self::Flip => OperationKind::Flip,
            Self::Blur { .. } => OperationKind::Blur,
            Self::CannyEdge { .. } => OperationKind::CannyEdge,
            Self::RgbBoost { .. } => OperationKind::RgbBoost,
            Self::BrightnessContrast { .. } => OperationKind::BrightnessContrast,
            Self::Rescale { .. } => OperationKind::Rescale,
            Self::Translate { .. } => OperationKind::Translate,
            Self::Rotate { .. } => OperationKind::Rotate,
            Self::CardinalScale { .. } => OperationKind::CardinalScale,
            Self::Crop { .. } => OperationKind::Crop,
            Self::Face {
                mode: FaceMode::Censor,
            } => OperationKind::FaceCensor,
            Self::Face {
                mode: FaceMode::Isolate,
            } => OperationKind::FaceIsolate,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.kind().endpoint()
    }

    /// JSON body for `POST /processes/defined/<endpoint>`
    pub fn payload(&self, image_id: &str) -> Value {
        let mut body = json!({ "image_id": image_id });
        let extra = match self {
            Self::Blur { amount }
            | Self::CannyEdge { amount }
            | Self::BrightnessContrast { amount } => json!({ "amount": amount }),
            Self::RgbBoost { red, green, blue } => {
                json!({ "red": red, "green": green, "blue": blue })
            }
            Self::Rescale { factor } => json!({ "factor": factor }),
            Self::Translate { dx, dy } => json!({ "dx": dx, "dy": dy }),
            Self::Rotate { angle } => json!({ "angle": angle }),
            Self::CardinalScale { sx, sy } => json!({ "sx": sx, "sy": sy }),
            Self::Crop {
                x,
                y,
                width,
                height,
            } => json!({ "x": x, "y": y, "width": width, "height": height }),
            Self::Face { mode } => json!({ "mode": mode.as_str() }),
            _ => Value::Null,
        };

        if let (Value::Object(body), Value::Object(extra)) = (&mut body, extra) {
            body.extend(extra);
        }
        body
    }
}

/// The validated table of operations the gateway accepts
#[derive(Debug, Clone)]
pub struct OperationTable {
    kinds: Vec<OperationKind>,
}

impl OperationTable {
    /// Build and validate the table; fails if any name or route is ambiguous
    pub fn new() -> Result<Self, AppError> {
        Self::from_kinds(OperationKind::ALL.to_vec())
    }

    pub(crate) fn from_kinds(kinds: Vec<OperationKind>) -> Result<Self, AppError> {
        let mut slugs = HashSet::new();
        let mut labels = HashSet::new();
        let mut routes = HashSet::new();

        for kind in &kinds {
            if kind.endpoint().trim().is_empty() {
                return Err(AppError::InvalidConfig(format!(
                    "operation {} has no endpoint",
                    kind.slug()
                )));
            }
            if !slugs.insert(kind.slug()) {
                return Err(AppError::InvalidConfig(format!(
                    "duplicate operation name: {}",
                    kind.slug()
                )));
            }
            if !labels.insert(kind.label().to_lowercase()) {
                return Err(AppError::InvalidConfig(format!(
                    "duplicate operation label: {}",
                    kind.label()
                )));
            }
            // Kinds may share a route only when the payload tells them apart
            let route = (kind.endpoint(), kind.payload_tag());
            if !routes.insert(route) {
                return Err(AppError::InvalidConfig(format!(
                    "operation {} collides on endpoint {}",
                    kind.slug(),
                    kind.endpoint()
                )));
            }
        }

        Ok(Self { kinds })
    }

    /// Resolve a requested name and bind its parameters
    pub fn resolve(&self, name: &str, params: &[f64]) -> Result<Operation, AppError> {
        let kind = OperationKind::lookup(name)
            .filter(|kind| self.kinds.contains(kind))
            .ok_or_else(|| AppError::UnknownOperation(name.to_string()))?;
        kind.build(params)
    }

    pub fn kinds(&self) -> &[OperationKind] {
        &self.kinds
    }
}
