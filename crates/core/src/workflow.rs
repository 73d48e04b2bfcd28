//! ComfyUI workflow template manipulation.
//!
//! A workflow is a node graph keyed by node id; each node carries a
//! `class_type` tag and a key→value input map. [`WorkflowTemplate`] is
//! loaded once per orchestration run and never mutated at rest —
//! [`WorkflowTemplate::instantiate`] deep-copies the graph and rewrites
//! the image, dimension, prompt, and seed inputs for a single job, so
//! concurrent jobs never share mutable node state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Node class sets
// ---------------------------------------------------------------------------

/// Node classes whose `width`/`height` inputs are overwritten directly.
pub const SIZED_OUTPUT_CLASSES: &[&str] = &[
    "EmptyLatentImage",
    "EmptySD3LatentImage",
    "EmptyImage",
    "EmptyFlux2LatentImage",
    "Flux2Scheduler",
];

/// Node class that takes a megapixel budget instead of explicit dimensions.
pub const MEGAPIXEL_CLASS: &str = "ImageScaleToTotalPixels";

/// Node classes whose `text` input receives the prompt verbatim.
pub const TEXT_ENCODER_CLASSES: &[&str] = &["CLIPTextEncode", "CLIPTextEncodeSDXL"];

/// Node class that loads an image from the backend's input folder.
pub const IMAGE_LOADER_CLASS: &str = "LoadImage";

/// Exclusive upper bound for generated seeds.
pub const SEED_MAX: u64 = 1 << 53;

/// Whether a node class carries a noise seed.
fn is_seed_class(class_type: &str) -> bool {
    class_type.contains("Sampler") || class_type == "RandomNoise"
}

// ---------------------------------------------------------------------------
// Graph types
// ---------------------------------------------------------------------------

/// Optional per-node metadata; the human-readable title hints which
/// role an image-loader node serves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One node of the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: serde_json::Map<String, Value>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl WorkflowNode {
    fn title_lower(&self) -> String {
        self.meta
            .as_ref()
            .map(|m| m.title.to_lowercase())
            .unwrap_or_default()
    }

    fn set_input(&mut self, key: &str, value: Value) {
        self.inputs.insert(key.to_string(), value);
    }

    fn has_input(&self, key: &str) -> bool {
        self.inputs.contains_key(key)
    }
}

/// Immutable description of a node graph, keyed by node id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowTemplate {
    pub nodes: BTreeMap<String, WorkflowNode>,
}

// ---------------------------------------------------------------------------
// Per-job parameters
// ---------------------------------------------------------------------------

/// Fixed node ids for image injection, when the workflow format pins them.
///
/// When set, [`FixedIdStrategy`] takes precedence over title-hint scanning.
#[derive(Debug, Clone, Default)]
pub struct PinnedImageNodes {
    /// Node id of the subject (influencer) image loader.
    pub subject: Option<String>,
    /// Node id of the visitor input image loader.
    pub input: Option<String>,
}

/// Everything that varies per generation job.
#[derive(Debug, Clone, Default)]
pub struct JobSpec {
    /// Backend-side filename of the visitor's uploaded image.
    pub input_image: String,
    /// Backend-side filename of the subject reference image.
    pub subject_image: Option<String>,
    /// Target output dimensions, when the preset overrides the template.
    pub dimensions: Option<(u32, u32)>,
    /// Prompt text, substituted literally into every text-encoder node.
    pub prompt: Option<String>,
    /// Fixed image-loader node ids, when known.
    pub pinned: PinnedImageNodes,
}

// ---------------------------------------------------------------------------
// Image injection strategies
// ---------------------------------------------------------------------------

/// Which image a loader node should receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// The reference subject appearing in every output.
    Subject,
    /// The paying visitor's own photo.
    Input,
}

/// Locates the image-loader node(s) for a role and rewrites their `image`
/// input. Returns `true` if the role was placed.
pub trait ImageInjectionStrategy {
    fn inject(&self, nodes: &mut BTreeMap<String, WorkflowNode>, role: ImageRole, filename: &str)
        -> bool;
}

/// Injection by known node id, for workflows with a fixed format.
pub struct FixedIdStrategy<'a> {
    pub pinned: &'a PinnedImageNodes,
}

impl ImageInjectionStrategy for FixedIdStrategy<'_> {
    fn inject(
        &self,
        nodes: &mut BTreeMap<String, WorkflowNode>,
        role: ImageRole,
        filename: &str,
    ) -> bool {
        let id = match role {
            ImageRole::Subject => self.pinned.subject.as_deref(),
            ImageRole::Input => self.pinned.input.as_deref(),
        };
        let Some(id) = id else { return false };
        match nodes.get_mut(id) {
            Some(node) => {
                node.set_input("image", Value::String(filename.to_string()));
                true
            }
            None => false,
        }
    }
}

/// Injection by scanning image-loader nodes and reading the role hint
/// from the node title, for generic workflow formats.
pub struct RoleHintStrategy;

const SUBJECT_HINTS: &[&str] = &["influencer", "reference", "subject"];
const INPUT_HINTS: &[&str] = &["fan", "input", "visitor"];

impl ImageInjectionStrategy for RoleHintStrategy {
    fn inject(
        &self,
        nodes: &mut BTreeMap<String, WorkflowNode>,
        role: ImageRole,
        filename: &str,
    ) -> bool {
        let hints = match role {
            ImageRole::Subject => SUBJECT_HINTS,
            ImageRole::Input => INPUT_HINTS,
        };
        for node in nodes.values_mut() {
            if node.class_type != IMAGE_LOADER_CLASS {
                continue;
            }
            let title = node.title_lower();
            if hints.iter().any(|h| title.contains(h)) {
                node.set_input("image", Value::String(filename.to_string()));
                return true;
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Dimension helpers
// ---------------------------------------------------------------------------

/// Megapixel budget for a target size: `clamp(w*h/1e6, 0.1, 16.0)` rounded
/// to three decimals. 1024×1024 → 1.049.
pub fn megapixels(width: u32, height: u32) -> f64 {
    let mp = (width as f64 * height as f64) / 1_000_000.0;
    let clamped = mp.clamp(0.1, 16.0);
    (clamped * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Template operations
// ---------------------------------------------------------------------------

impl WorkflowTemplate {
    /// Parse a stored workflow definition.
    pub fn parse(definition: &str) -> Result<Self, CoreError> {
        serde_json::from_str(definition)
            .map_err(|e| CoreError::TemplateUnavailable(format!("invalid workflow JSON: {e}")))
    }

    /// The graph as the JSON value submitted to the backend.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.nodes).unwrap_or(Value::Null)
    }

    /// Build the concrete graph for one job. The template itself is left
    /// untouched; every call draws fresh seeds.
    pub fn instantiate(&self, spec: &JobSpec) -> WorkflowTemplate {
        let mut nodes = self.nodes.clone();

        // Image injection: fixed ids win, title hints fill the gaps.
        let fixed = FixedIdStrategy {
            pinned: &spec.pinned,
        };
        let hint = RoleHintStrategy;

        if !fixed.inject(&mut nodes, ImageRole::Input, &spec.input_image) {
            hint.inject(&mut nodes, ImageRole::Input, &spec.input_image);
        }
        if let Some(ref subject) = spec.subject_image {
            if !fixed.inject(&mut nodes, ImageRole::Subject, subject) {
                hint.inject(&mut nodes, ImageRole::Subject, subject);
            }
        }

        if let Some((width, height)) = spec.dimensions {
            apply_dimensions(&mut nodes, width, height);
        }

        if let Some(ref prompt) = spec.prompt {
            apply_prompt(&mut nodes, prompt);
        }

        apply_seeds(&mut nodes);

        WorkflowTemplate { nodes }
    }
}

fn apply_dimensions(nodes: &mut BTreeMap<String, WorkflowNode>, width: u32, height: u32) {
    let mp = megapixels(width, height);
    for node in nodes.values_mut() {
        if SIZED_OUTPUT_CLASSES.contains(&node.class_type.as_str()) {
            if node.has_input("width") {
                node.set_input("width", Value::from(width));
            }
            if node.has_input("height") {
                node.set_input("height", Value::from(height));
            }
        } else if node.class_type == MEGAPIXEL_CLASS {
            node.set_input("megapixels", Value::from(mp));
        }
    }
}

fn apply_prompt(nodes: &mut BTreeMap<String, WorkflowNode>, prompt: &str) {
    for node in nodes.values_mut() {
        if TEXT_ENCODER_CLASSES.contains(&node.class_type.as_str()) && node.has_input("text") {
            node.set_input("text", Value::String(prompt.to_string()));
        }
    }
}

/// Each seed-bearing input gets its own draw, so multi-sampler stages
/// stay decoupled.
fn apply_seeds(nodes: &mut BTreeMap<String, WorkflowNode>) {
    for node in nodes.values_mut() {
        if !is_seed_class(&node.class_type) {
            continue;
        }
        if node.has_input("seed") {
            node.set_input("seed", Value::from(draw_seed()));
        }
        if node.has_input("noise_seed") {
            node.set_input("noise_seed", Value::from(draw_seed()));
        }
    }
}

/// Draw a fresh seed in `[0, 2^53)`.
fn draw_seed() -> u64 {
    use rand::Rng;
    rand::rng().random_range(0..SEED_MAX)
}

// ---------------------------------------------------------------------------
