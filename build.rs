const COMMANDS: &[&str] = &[
    "render_pdf",
    "render_pdf_pages",
    "cleanup_renders",
    "invoke_method",
];

fn main() {
    // Generates allow-/deny- permissions for every command under
    // permissions/autogenerated; the default set lives in permissions/default.toml
    tauri_plugin::Builder::new(COMMANDS).build();
}
