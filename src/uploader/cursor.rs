/// The sequence token the next upload must present.
///
/// `None` is valid only for the first upload to a freshly created stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamCursor {
    sequence_token: Option<String>,
}

impl StreamCursor {
    pub fn new(sequence_token: Option<String>) -> Self {
        Self { sequence_token }
    }

    pub fn token(&self) -> Option<&str> {
        self.sequence_token.as_deref()
    }

    /// Adopt the token returned by the service
    pub fn advance(&mut self, next_sequence_token: Option<String>) {
        self.sequence_token = next_sequence_token;
    }
}
