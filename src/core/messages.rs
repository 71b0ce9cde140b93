//! Fixed user-facing and log messages.
//!
//! Templates carry a `{}` placeholder and are filled through the helper
//! functions at the bottom of this file.

// Completion API failure codes (logged).
pub const ERR_MSG_OPEN_AI_API_ERROR: &str = "APIError: Issue on OpenAI side.";
pub const ERR_MSG_OPEN_AI_TIMEOUT: &str = "Timeout: Request timed out.";
pub const ERR_MSG_OPEN_AI_RATE_LIMIT_ERROR: &str =
    "RateLimitError: You have hit your assigned rate limit.";
pub const ERR_MSG_OPEN_AI_API_CONNECTION_ERROR: &str =
    "APIConnectionError: Issue connecting to OpenAI services.";
pub const ERR_MSG_OPEN_AI_OTHERS_ERROR: &str = "Open AI Error: Issue on OpenAI servers.";
pub const ERR_MSG_CONTENT_FILTER: &str = "FINISH REASON: content_filter:: The content filtering detects specific categories of potentially harmful.";
pub const ERR_MSG_TOKEN_LENGTH: &str =
    "FINISH REASON:: length: Incomplete model output due to limit of chat's length.";
pub const ERR_MSG_CONTENT_NULL: &str =
    "FINISH REASON: null: Response of N-CHAT still in progress or incomplete.";

// Completion API failure messages (displayed).
pub const DISP_MSG_OPEN_AI_RETRY: &str = "Retry sending the message again after a brief wait.";
pub const DISP_MSG_OPEN_AI_RATE_LIMIT: &str = "Pace your requests more slowly.";
pub const DISP_MSG_OPEN_AI_API_CONNECTION_ERROR: &str =
    "Retry sending the message again after a brief wait and contact if the issue persists.";
pub const DISP_MSG_OPEN_AI_OTHERS_ERROR: &str = "There was a connection issue with the language model service. Retry sending the message again after a brief wait.";
pub const DISP_MSG_TOKEN_LENGTH: &str = "Incomplete model output due to limit of chat's length.";
pub const DISP_MSG_CONTENT_FILTER: &str =
    "The content filtering detects specific categories of potentially harmful.";
pub const DISP_MSG_CONTENT_NULL: &str = "Response of N-CHAT still in progress or incomplete.";

// Request outcomes.
pub const ERROR_MESSAGE_NOT_EXCEL_FILE: &str = "Only Excel files are allowed.";
pub const ERROR_MESSAGE_GENERAL: &str = "An error occurred. {}";
pub const ERROR_MESSAGE_SPREADSHEET_PARSER_FAIL: &str = "Spreadsheet parser error. {}";
pub const ERROR_MESSAGE_ZERO_CHUNKS: &str = "Chunk size can not be zero.";
pub const ERROR_MESSAGE_DATABASE_EXCEPTION: &str = "Database exception occurred. {}";
pub const ERROR_MESSAGE_EMBEDDING_SAVE_EXCEPTION: &str = "Error on saving embedding file. {}";
pub const ERROR_MESSAGE_VECTORSTORE_LOAD_EXCEPTION: &str = "Error on loading vectorstore. {}";
pub const ERROR_MESSAGE_TOKENIZER: &str = "Tokenizer error. {}";
pub const ERROR_MESSAGE_EMPTY_QUERY: &str = "Query can not be empty.";
pub const ERROR_MESSAGE_EMPTY_CHATID: &str = "Chat ID can not be empty.";
pub const ERROR_MESSAGE_CHAT_NOT_FOUND: &str = "Chat with id {} not found.";
pub const ERROR_MESSAGE_EMPTY_RATING: &str = "Rating must be in range between 1 and 10.";
pub const ERROR_MESSAGE_EMPTY_EMAIL: &str = "Email can not be empty.";
pub const ERROR_MESSAGE_CHAT_CREATE: &str = "Chat creation failed. {}";
pub const ERROR_INVALID_ACCESS_TOKEN: &str = "The access token is invalid";
pub const ERROR_EXPIRED_ACCESS_TOKEN: &str = "The access token expired";
pub const SUCCESS_MESSAGE_NO_NEW_DATA_FOR_EMBEDDING: &str = "No new data for embedding.";
pub const SUCCESS_MESSAGE_FILE_UPLOAD: &str = "File uploaded successfully.";
pub const SUCCESS_MESSAGE_EMBEDDING_FILES_CREATION: &str =
    "Embedding files are successfully created.";

// Progress events of the query stream.
pub const PROGRESS_MESSAGE_SEARCHING: &str = "Searching for relevant data";
pub const PROGRESS_MESSAGE_GENERATING: &str = "Create a response";

pub fn fill(template: &str, value: impl std::fmt::Display) -> String {
    template.replacen("{}", &value.to_string(), 1)
}

pub fn general(reason: impl std::fmt::Display) -> String {
    fill(ERROR_MESSAGE_GENERAL, reason)
}

pub fn chat_not_found(chat_id: impl std::fmt::Display) -> String {
    fill(ERROR_MESSAGE_CHAT_NOT_FOUND, chat_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_replaces_only_the_first_placeholder() {
        assert_eq!(general("boom"), "An error occurred. boom");
        assert_eq!(chat_not_found(7), "Chat with id 7 not found.");
        assert_eq!(fill("{} and {}", 1), "1 and {}");
    }
}
