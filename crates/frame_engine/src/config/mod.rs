//! Configuration system
//!
//! Renderer settings live in [`RendererConfig`], loadable from TOML or RON
//! through the [`Config`] trait.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// SPIR-V locations for one vertex/fragment shader pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderPair {
    /// Path to the vertex shader SPIR-V file
    pub vertex: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment: String,
}

impl ShaderPair {
    /// Create a new shader pair
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Resolve both paths against the common shader output locations
    pub fn resolved(&self) -> Self {
        Self {
            vertex: resolve_shader_path(&self.vertex),
            fragment: resolve_shader_path(&self.fragment),
        }
    }
}

/// Shader configuration for the built-in pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Untextured mesh pipeline (vertex colors)
    pub mesh: ShaderPair,
    /// Textured mesh pipeline (binds a texture set at index 2)
    pub textured_mesh: ShaderPair,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            mesh: ShaderPair::new("shaders/tri_mesh.vert.spv", "shaders/default_lit.frag.spv"),
            textured_mesh: ShaderPair::new("shaders/tri_mesh.vert.spv", "shaders/textured_lit.frag.spv"),
        }
    }
}

/// Check the given path, then `target/shaders/` and `../target/shaders/`
fn resolve_shader_path(base_path: &str) -> String {
    if Path::new(base_path).exists() {
        return base_path.to_string();
    }

    let Some(file_name) = Path::new(base_path).file_name().and_then(|name| name.to_str()) else {
        return base_path.to_string();
    };

    for prefix in ["target/shaders", "../target/shaders"] {
        let candidate = format!("{prefix}/{file_name}");
        if Path::new(&candidate).exists() {
            return candidate;
        }
    }

    base_path.to_string()
}

/// Configuration for the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Size of the render target in pixels (width, height)
    pub render_extent: (u32, u32),
    /// How long a frame slot may wait on its render fence, in nanoseconds
    pub fence_timeout_ns: u64,
    /// How long an immediate submit may block, in nanoseconds
    pub upload_timeout_ns: u64,
    /// Capacity of each frame slot's object buffer
    pub max_objects: usize,
    /// Background clear color [R, G, B, A] (0.0-1.0 range)
    pub clear_color: [f32; 4],
    /// Whether to enable Vulkan validation layers (debug builds only)
    pub enable_validation: bool,
    /// Number of frames the demo renders before shutting down
    pub frames_to_render: u64,
    /// Shader configuration
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            render_extent: (1700, 900),
            fence_timeout_ns: 1_000_000_000,
            upload_timeout_ns: 10_000_000_000,
            max_objects: 10_000,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            enable_validation: cfg!(debug_assertions),
            frames_to_render: 600,
            shaders: ShaderConfig::default(),
        }
    }

    /// Set the render target size; zero dimensions are raised to one pixel
    pub fn with_render_extent(mut self, width: u32, height: u32) -> Self {
        self.render_extent = (width.max(1), height.max(1));
        self
    }

    /// Set the frame fence timeout
    pub fn with_fence_timeout_ns(mut self, timeout: u64) -> Self {
        self.fence_timeout_ns = timeout.max(1);
        self
    }

    /// Set the per-slot object capacity (at least one object)
    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects.max(1);
        self
    }

    /// Set background clear color [R, G, B, A] (0.0-1.0 range)
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Enable or disable Vulkan validation layers
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Set shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Aspect ratio of the render target
    pub fn aspect_ratio(&self) -> f32 {
        self.render_extent.0 as f32 / self.render_extent.1 as f32
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Frame Engine")
    }
}

impl Config for RendererConfig {}
