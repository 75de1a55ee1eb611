fn main() {
    // ESP-IDF link arguments only matter for the firmware build.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
