// build.rs
fn main() {
    // Generate build info
    vergen::EmitBuilder::builder()
        .all_build()
        .emit()
        .expect("Unable to generate build info");

    println!("cargo:rerun-if-changed=build.rs");
}
