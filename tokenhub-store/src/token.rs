use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Length of the opaque tokens handed to clients
pub const SESSION_TOKEN_LENGTH: usize = 32;

/// Creates a fresh token identifying a client session
pub fn session_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
