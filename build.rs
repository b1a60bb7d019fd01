use std::env;
use std::path::Path;

fn main() {
    let target = env::var("TARGET").unwrap();

    if target.contains("windows") {
        let mut res = winres::WindowsResource::new();

        if Path::new("resources/icon.ico").exists() {
            res.set_icon("resources/icon.ico");
        }

        res.set("FileDescription", "Manga Viewer");
        res.set("ProductName", "Manga Viewer");
        res.set("FileVersion", env!("CARGO_PKG_VERSION"));
        res.set("ProductVersion", env!("CARGO_PKG_VERSION"));

        res.compile().unwrap();
    }
}
