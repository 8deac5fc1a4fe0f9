pub mod dictionary_api;
pub mod telegram;

pub use dictionary_api::DictionaryApiClient;
pub use telegram::TelegramClient;
