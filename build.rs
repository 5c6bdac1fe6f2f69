fn main() {
    // ESP-IDF environment propagation is only needed for flash builds.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
