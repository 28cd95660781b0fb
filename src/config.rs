use std::env;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the named environment variable parsed as a port number, or panics.
pub fn get_port(name: &str) -> u16 {
    get_variable(name)
        .parse()
        .unwrap_or_else(|_| panic!("parse {} as u16", name))
}
