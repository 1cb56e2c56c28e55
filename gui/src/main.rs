use std::error::Error;

use winit::event_loop::{ControlFlow, EventLoop};

mod app;
mod config;
mod scene;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Use WASD to move, and hold the left mouse button to look around.");
    log::info!("Use the left and right arrow keys to change the sky, F12 to save its faces.");
    log::info!("Press escape or close the window to exit.");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = app::Application::new(config::AppConfig::from_env());
    event_loop.run_app(&mut app)?;
    app.finish()?;

    Ok(())
}
