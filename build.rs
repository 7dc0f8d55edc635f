// build.rs

fn main() {
    // Generate build info (VERGEN_BUILD_TIMESTAMP, used by `lightsocks-monitor version`)
    vergen::EmitBuilder::builder()
        .all_build()
        .emit()
        .expect("Unable to generate build info");
}
