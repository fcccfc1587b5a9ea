use std::error::Error;

// Exposes VERGEN_GIT_SHA and VERGEN_CARGO_TARGET_TRIPLE to `iocbuild doctor`.
fn main() -> Result<(), Box<dyn Error>> {
    vergen_gitcl::Emitter::default()
        .add_instructions(
            &vergen_gitcl::GitclBuilder::default()
                .sha(true)
                .dirty(true)
                .build()?,
        )?
        .emit()?;
    println!(
        "cargo:rustc-env=VERGEN_CARGO_TARGET_TRIPLE={}",
        std::env::var("TARGET")?
    );
    Ok(())
}
