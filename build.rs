fn main() {
    println!("cargo:rerun-if-changed=app.manifest");

    // Only run on Windows
    #[cfg(target_os = "windows")]
    {
        let mut res = winres::WindowsResource::new();

        // Per-monitor DPI awareness keeps SetCursorPos in the same coordinate
        // space as GetWindowRect
        res.set_manifest_file("app.manifest");
        res.set("FileDescription", "LoL Account Launcher");

        if let Err(e) = res.compile() {
            eprintln!("Failed to compile Windows resources: {}", e);
        }
    }
}
