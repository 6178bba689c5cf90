//! The viewer application and its render loop.
//!
//! The event loop follows this pattern each frame:
//! 1. Compare the surface configuration against the window's current size;
//!    reconfigure surface, depth texture and projection aspect if they differ
//! 2. Render the scene (ground plane, plus the windmill once it loaded)
//! 3. Request the next redraw
//!
//! The model load runs as a background task spawned at startup: material
//! library first, then the geometry that references it, then one user event
//! that attaches the finished model to the scene. The loop never waits for
//! it; a partial scene renders fine.

use std::{fmt::Debug, iter, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    context::{Context, MouseButtonState},
    data_structures::{model, model::DrawModel, texture::Texture},
    resources,
    scene::{self, LoadStage, Scene},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Events delivered through the event loop proxy: deferred initialization
/// (WASM only) and progress of the background model load.
pub(crate) enum ViewerEvent {
    #[allow(dead_code)]
    Initialized(ViewerState),
    Stage(LoadStage),
    ModelReady(model::Model),
}

impl Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::Stage(stage) => f.debug_tuple("Stage").field(stage).finish(),
            Self::ModelReady(_) => f.write_str("ModelReady"),
        }
    }
}

/// Application state bundle: GPU context, scene and surface status.
#[derive(Debug)]
pub(crate) struct ViewerState {
    ctx: Context,
    scene: Scene,
    is_surface_configured: bool,
}

impl ViewerState {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        let scene = Scene::load(&ctx.device, &ctx.queue).await?;
        Ok(Self {
            ctx,
            scene,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    /// Resize the surface only if the window's size drifted away from the
    /// current configuration. Returns whether a resize happened, so a
    /// stream of redraws at a stable size never reconfigures anything.
    fn sync_surface_size(&mut self) -> bool {
        let size = self.ctx.window.inner_size();
        if surface_needs_resize(&self.ctx.config, size) {
            self.resize(size.width, size.height);
            true
        } else {
            false
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // Keep the loop going: each frame schedules the next one.
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder: wgpu::CommandEncoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });
        {
            let mut render_pass: wgpu::RenderPass<'_> =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.ctx.depth_texture.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });

            for model in self.scene.models() {
                for mesh in &model.meshes {
                    let material = &model.materials[mesh.material.min(model.materials.len() - 1)];
                    let pipeline = if material.double_sided {
                        &self.ctx.pipelines.model_double_sided
                    } else {
                        &self.ctx.pipelines.model
                    };
                    render_pass.set_pipeline(pipeline);
                    render_pass.draw_mesh(
                        mesh,
                        material,
                        &self.ctx.camera.bind_group,
                        &self.ctx.light.bind_group,
                    );
                }
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// True when the surface's backing store no longer matches the displayed
/// window size. Zero-sized windows (minimized) never trigger a resize.
pub(crate) fn surface_needs_resize(
    config: &wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
) -> bool {
    size.width > 0
        && size.height > 0
        && (config.width != size.width || config.height != size.height)
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    state: Option<ViewerState>,
    last_time: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            state: None,
            last_time: Instant::now(),
        })
    }

    /// Kick off the background model load. Fire-and-forget: progress and
    /// the finished model arrive as user events, a failure is logged and
    /// the model simply never appears.
    fn spawn_model_load(&self, ctx: &Context) {
        let device = ctx.device.clone();
        let queue = ctx.queue.clone();
        let proxy = self.proxy.clone();
        let load = async move {
            let result = load_windmill(&device, &queue, &proxy).await;
            match result {
                Ok(windmill) => {
                    let _ = proxy.send_event(ViewerEvent::ModelReady(windmill));
                }
                Err(e) => log::error!("model load failed, continuing without it: {e:#}"),
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.spawn(load);

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(load);
    }
}

/// The two-stage load sequence: material library first, then the geometry
/// that references it. Ordering is enforced by awaiting the first stage's
/// result before starting the second.
async fn load_windmill(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    proxy: &EventLoopProxy<ViewerEvent>,
) -> anyhow::Result<model::Model> {
    let _ = proxy.send_event(ViewerEvent::Stage(LoadStage::LoadingMaterials));
    let mut library = resources::load_material_library(scene::WINDMILL_MTL).await?;

    // The blades material renders single-sided by default, which makes the
    // blades disappear when seen from behind. MTL can't express the fix.
    if !library.set_double_sided(scene::BLADES_MATERIAL) {
        log::warn!(
            "material {:?} not found in {}; blades will render single-sided",
            scene::BLADES_MATERIAL,
            scene::WINDMILL_MTL
        );
    }

    let _ = proxy.send_event(ViewerEvent::Stage(LoadStage::LoadingGeometry));
    let parsed = resources::load_model_obj(scene::WINDMILL_OBJ, &library).await?;

    parsed.upload(&library, device, queue)
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("windmill viewer");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("cannot create the viewer window: {e}");
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let state = match self.async_runtime.block_on(ViewerState::new(window)) {
                Ok(state) => state,
                Err(e) => panic!("App initialization failed. Cannot create the main context: {e}"),
            };
            self.spawn_model_load(&state.ctx);
            self.state = Some(state);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let state = ViewerState::new(window)
                    .await
                    .expect("App initialization failed. Cannot create the main context");
                assert!(proxy.send_event(ViewerEvent::Initialized(state)).is_ok());
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Initialized(state) => {
                // This is the message from our wasm `spawn_local`
                self.state = Some(state);
                let state = self.state.as_mut().unwrap();

                // Important: Trigger a resize and redraw now that we are initialized
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height);
                let state = self.state.as_ref().unwrap();
                self.spawn_model_load(&state.ctx);
                state.ctx.window.request_redraw();
            }
            ViewerEvent::Stage(stage) => {
                if let Some(state) = &mut self.state {
                    log::info!("model load stage: {stage:?}");
                    state.scene.stage = stage;
                }
            }
            ViewerEvent::ModelReady(windmill) => {
                if let Some(state) = &mut self.state {
                    log::info!(
                        "model attached ({} meshes, {} materials)",
                        windmill.meshes.len(),
                        windmill.materials.len()
                    );
                    state.scene.attach_windmill(windmill);
                }
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if let MouseButtonState::Left = state.ctx.mouse {
                state.ctx.camera.controller.handle_mouse(dx, dy);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.ctx.camera.controller.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if surface_needs_resize(&state.ctx.config, size) {
                    state.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                // The per-frame check: the surface follows the displayed
                // size, and the projection aspect follows the surface.
                state.sync_surface_size();

                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                match state.render() {
                    Ok(_) => {
                        // Apply pending orbit input and upload the camera.
                        state
                            .ctx
                            .camera
                            .controller
                            .update(&mut state.ctx.camera.camera, dt);
                        state
                            .ctx
                            .camera
                            .uniform
                            .update_view_proj(&state.ctx.camera.camera, &state.ctx.projection);
                        state.ctx.queue.write_buffer(
                            &state.ctx.camera.buffer,
                            0,
                            bytemuck::cast_slice(&[state.ctx.camera.uniform]),
                        );
                    }
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {e}");
                    }
                }
            }
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                state.ctx.mouse = match (button, button_state.is_pressed()) {
                    (MouseButton::Left, true) => MouseButtonState::Left,
                    (MouseButton::Right, true) => MouseButtonState::Right,
                    _ => MouseButtonState::None,
                };
            }
            _ => {}
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {e}");
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    if let Err(e) = run() {
        log::error!("viewer exited with an error: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Projection;

    fn config(width: u32, height: u32) -> wgpu::SurfaceConfiguration {
        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    #[test]
    fn resize_triggers_only_on_size_drift() {
        let config = config(800, 600);
        assert!(!surface_needs_resize(&config, PhysicalSize::new(800, 600)));
        assert!(surface_needs_resize(&config, PhysicalSize::new(801, 600)));
        assert!(surface_needs_resize(&config, PhysicalSize::new(800, 599)));
    }

    #[test]
    fn minimized_window_never_resizes() {
        let config = config(800, 600);
        assert!(!surface_needs_resize(&config, PhysicalSize::new(0, 600)));
        assert!(!surface_needs_resize(&config, PhysicalSize::new(800, 0)));
        assert!(!surface_needs_resize(&config, PhysicalSize::new(0, 0)));
    }

    // Drives the per-tick decision logic (the pure half of
    // `sync_surface_size`) through a window size sequence and checks that
    // the aspect follows exactly the ticks where the size drifted.
    #[test]
    fn aspect_follows_displayed_size_without_thrashing() {
        let mut config = config(800, 600);
        let mut projection = Projection::new(config.width, config.height, cgmath::Deg(45.0), 0.1, 100.0);
        let mut reconfigures = 0;

        let displayed = [
            PhysicalSize::new(800, 600),
            PhysicalSize::new(1024, 768),
            PhysicalSize::new(1024, 768),
            PhysicalSize::new(1024, 768),
            PhysicalSize::new(640, 480),
        ];

        for size in displayed {
            if surface_needs_resize(&config, size) {
                config.width = size.width;
                config.height = size.height;
                projection.resize(size.width, size.height);
                reconfigures += 1;
            }
            // After every tick the aspect matches the displayed size.
            let want = size.width as f32 / size.height as f32;
            assert!((projection.aspect - want).abs() < 1e-6);
        }

        // Only the two actual changes reconfigured the surface.
        assert_eq!(reconfigures, 2);
    }
}
