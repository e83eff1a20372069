pub mod agent;
pub mod converse;
pub mod openai;

pub use agent::AgentFrameworkAdapter;
pub use converse::ConverseAdapter;
pub use openai::OpenAiAdapter;
