pub mod catalog;
pub mod migrations;
pub mod open;
pub mod reset;
pub mod status;
pub mod template;

/// Print `value` as a single JSON line, or the serialization error
pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

pub(crate) fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("ERROR: {}", message);
    std::process::exit(1);
}
