fn main() {
    // Lets the cdylib resolve libpython symbols at import time instead of link time.
    pyo3_build_config::add_extension_module_link_args();
}
