/// Who sent a message and where, passed to every handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderContext {
    pub user_id: String,
    pub username: String,
    pub channel_id: String,
}

impl SenderContext {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            channel_id: channel_id.into(),
        }
    }
}
