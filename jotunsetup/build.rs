// build.rs — assemble the real-mode stubs (intcall, protected-mode jump)
use std::{env, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=asm/x86/intcall.asm");
    println!("cargo:rerun-if-changed=asm/x86/pmjump.asm");

    // Host builds (tests, docs) never link the real-mode image.
    if env::var_os("CARGO_FEATURE_BIOS").is_none() {
        return;
    }
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    if arch != "x86" {
        let target = env::var("TARGET").unwrap_or_default();
        println!("cargo:warning=Skipping real-mode ASM for non-x86 target: {target}");
        return;
    }

    let mut build = nasm_rs::Build::new();

    // The setup stage is linked as a 32-bit ELF even though it runs in real mode.
    build.flag("-f").flag("elf32");
    build.include("asm/x86");

    if env::var("PROFILE").as_deref() == Ok("debug") {
        build.debug(true);
        build.flag("-w+all");
    }

    build
        .file("asm/x86/intcall.asm")
        .file("asm/x86/pmjump.asm");

    if let Err(e) = build.compile("setup_x86_asm") {
        panic!("NASM build failed: {e}");
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    println!("cargo:rustc-link-search=native={}", out_dir.display());
    println!("cargo:rustc-link-lib=static=setup_x86_asm");
}
