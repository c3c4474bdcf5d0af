mod app;
mod renderer;
mod theme;

use anyhow::anyhow;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1480.0, 980.0])
            .with_title("busvis"),
        ..Default::default()
    };
    eframe::run_native(
        "busvis",
        options,
        Box::new(|cc| Ok(Box::new(app::BusVisApp::new(cc)))),
    )
    .map_err(|err| anyhow!("failed to start ui: {err}"))
}
