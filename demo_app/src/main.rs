//! Offscreen demo
//!
//! Renders a grid of triangles around a cube into an offscreen target for a
//! fixed number of frames, then tears everything down.
//!
//! Usage: `offscreen_demo [config.toml|config.ron]`. Set `DEMO_TEXTURE` to an
//! image path to texture the cube with it instead of a generated checkerboard.

use std::rc::Rc;

use ash::vk;
use frame_engine::foundation::logging;
use frame_engine::prelude::*;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("renderer error: {0}")]
    Vulkan(#[from] VulkanError),
}

fn load_config() -> Result<RendererConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {path}");
            Ok(RendererConfig::load_from_file(&path)?)
        }
        None => Ok(RendererConfig::new("Offscreen Demo")),
    }
}

fn checkerboard(size: u32) -> TexturePixels {
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let value = if (x / 8 + y / 8) % 2 == 0 { 230 } else { 40 };
            rgba.extend_from_slice(&[value, value, value, 255]);
        }
    }
    TexturePixels {
        width: size,
        height: size,
        rgba,
    }
}

fn demo_texture() -> TexturePixels {
    match std::env::var("DEMO_TEXTURE") {
        Ok(path) => match TexturePixels::load(&path) {
            Ok(pixels) => pixels,
            Err(e) => {
                log::warn!("Could not load {path}: {e}; using a checkerboard");
                checkerboard(64)
            }
        },
        Err(_) => checkerboard(64),
    }
}

/// Build pipelines, upload assets and lay out the scene, sorted by material
/// then mesh so the draw loop binds as little as possible
fn build_scene(engine: &mut Engine<VulkanContext, OffscreenTarget>) -> Result<Vec<RenderObject>, DemoError> {
    let shaders = engine.config().shaders.clone();
    let mesh_shaders = shaders.mesh.resolved();
    let textured_shaders = shaders.textured_mesh.resolved();

    let vertex = engine.load_shader_module(&mesh_shaders.vertex)?;
    let colored_fragment = engine.load_shader_module(&mesh_shaders.fragment)?;
    let textured_vertex = engine.load_shader_module(&textured_shaders.vertex)?;
    let textured_fragment = engine.load_shader_module(&textured_shaders.fragment)?;

    let mesh_layout = engine.mesh_pipeline_layout();
    let mesh_builder = engine
        .pipeline_builder(mesh_layout)
        .with_shader(vk::ShaderStageFlags::VERTEX, vertex)
        .with_shader(vk::ShaderStageFlags::FRAGMENT, colored_fragment);
    let mesh_pipeline = engine.build_pipeline(&mesh_builder)?;

    let textured_layout = engine.textured_pipeline_layout();
    let textured_builder = engine
        .pipeline_builder(textured_layout)
        .with_shader(vk::ShaderStageFlags::VERTEX, textured_vertex)
        .with_shader(vk::ShaderStageFlags::FRAGMENT, textured_fragment);
    let textured_pipeline = engine.build_pipeline(&textured_builder)?;

    for module in [vertex, colored_fragment, textured_vertex, textured_fragment] {
        engine.release_shader_module(module);
    }

    let default_material = engine.create_material("defaultmesh", mesh_pipeline, mesh_layout);
    let textured_material = engine.create_material("texturedmesh", textured_pipeline, textured_layout);

    let texture = engine.upload_texture("demo_diffuse", &demo_texture())?;
    engine.bind_texture(textured_material, texture)?;

    let cube = engine.upload_mesh("cube", &MeshData::cube())?;
    let triangle = engine.upload_mesh("triangle", &MeshData::triangle())?;

    let mut objects = vec![RenderObject {
        mesh: cube,
        material: textured_material,
        transform: Mat4::new_scaling(2.0),
    }];
    for x in -20..=20 {
        for y in -20..=20 {
            let translation = Mat4::new_translation(&Vec3::new(x as f32, 0.0, y as f32));
            objects.push(RenderObject {
                mesh: triangle,
                material: default_material,
                transform: translation * Mat4::new_scaling(0.2),
            });
        }
    }

    log::info!("Scene has {} render objects", objects.len());
    Ok(objects)
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    let (width, height) = config.render_extent;
    let extent = vk::Extent2D { width, height };
    let frames = config.frames_to_render;

    let device = Rc::new(VulkanContext::new(&config)?);
    let mut engine = Engine::init(device, config, |device, deletion| {
        OffscreenTarget::new(device, extent, deletion)
    })?;

    let objects = build_scene(&mut engine)?;

    let mut total_draws = 0;
    for _ in 0..frames {
        let phase = engine.frame_number() as f32 / 120.0;
        engine.scene_parameters_mut().set_ambient_color(Vec4::new(phase.sin(), 0.0, phase.cos(), 1.0));
        let stats = engine.draw(&objects);
        total_draws += stats.draw_calls;
    }

    log::info!(
        "Rendered {} frames ({} draw calls, {} frames reached the target)",
        engine.frame_number(),
        total_draws,
        engine.target().frames_rendered()
    );
    engine.cleanup();
    Ok(())
}

fn main() {
    logging::init();
    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESH_VERTEX_SHADER: &str = include_str!("../shaders/tri_mesh.vert");

    #[test]
    fn test_vertex_shader_indexes_objects_without_draw_parameters() {
        // gl_BaseInstance needs GLSL 460 plus the shaderDrawParameters feature
        assert!(MESH_VERTEX_SHADER.contains("objects[gl_InstanceIndex]"));
        assert!(!MESH_VERTEX_SHADER.contains("gl_BaseInstance"));
        assert!(MESH_VERTEX_SHADER.starts_with("#version 450"));
    }

    #[test]
    fn test_checkerboard_is_tightly_packed_rgba() {
        let pixels = checkerboard(16);
        assert_eq!(pixels.rgba.len(), 16 * 16 * 4);
        assert_eq!(&pixels.rgba[..4], &[230, 230, 230, 255]);
        assert_eq!(&pixels.rgba[8 * 4..8 * 4 + 4], &[40, 40, 40, 255]);
    }
}
