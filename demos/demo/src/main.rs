use boa_ports::{DevServerSource, PortsApp};

fn main() {
    // Load the app bundle from a local dev server
    let source = DevServerSource::default()
        .with_module_name("ports-demo")
        .with_entry_point("src/index.js");

    let app = PortsApp::mount(source, "app").expect("Failed to mount app");

    // Pump the JS event loop so timers and socket events keep flowing
    loop {
        app.tick();
        std::thread::sleep(std::time::Duration::from_millis(16));
    }
}
