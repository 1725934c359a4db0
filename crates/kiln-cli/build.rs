fn main() {
    // Packages are dlopened at runtime and resolve the Kiln_* host symbols
    // against this executable, so they must land in the dynamic symbol table.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("linux") {
        println!("cargo:rustc-link-arg=-rdynamic");
    }
}
