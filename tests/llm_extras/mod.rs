use llm::{
    chat::{ChatMessage, ChatProvider, ChatResponse, Tool},
    error::LLMError,
};
use std::sync::Mutex;

/// Runs `extract_fields` against a stubbed model answer for each case.
#[macro_export]
macro_rules! assert_extractions {
    (
        $(
            $test_name:ident : response => $response:expr, check => $check:expr
        ),+ $(,)?
    ) => {
        $(
            #[tokio::test]
            async fn $test_name() {
                let model = StubLlmProvider::new($response);
                let context = opportunity_bot::extract::ExtractContext {
                    model: &model,
                    prompt_template: None,
                };
                let page = opportunity_bot::PageContent {
                    url: "https://example.com/job".to_owned(),
                    title: "Example".to_owned(),
                    text: "An internship for first-year students.".to_owned(),
                    error: None,
                };
                let result = opportunity_bot::extract::extract_fields(&page, "", &context).await;

                let check: fn(anyhow::Result<opportunity_bot::extract::ExtractedFields>) = $check;
                check(result);
            }
        )+
    }
}

/// Chat provider answering every request with a canned response and
/// remembering the prompts it was sent.
pub(crate) struct StubLlmProvider {
    response_content: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl StubLlmProvider {
    pub fn new(response_content: &str) -> Self {
        StubLlmProvider {
            response_content: Ok(response_content.to_owned()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn failing(message: &str) -> Self {
        StubLlmProvider {
            response_content: Err(message.to_owned()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("Prompt log poisoned").clone()
    }
}

impl ChatProvider for StubLlmProvider {
    fn chat<'life0, 'life1, 'async_trait>(
        &'life0 self,
        messages: &'life1 [ChatMessage],
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            #[derive(Debug)]
            struct StringResponse(String);

            impl ChatResponse for StringResponse {
                fn text(&self) -> Option<String> {
                    Some(self.0.clone())
                }

                fn tool_calls(&self) -> Option<Vec<llm::ToolCall>> {
                    panic!()
                }

                fn thinking(&self) -> Option<String> {
                    None
                }

                fn usage(&self) -> Option<llm::chat::Usage> {
                    None
                }
            }

            impl std::fmt::Display for StringResponse {
                fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(formatter, "{}", self.0)
                }
            }

            self.prompts
                .lock()
                .expect("Prompt log poisoned")
                .extend(messages.iter().map(|message| message.content.clone()));

            match &self.response_content {
                Ok(content) => {
                    Ok(Box::new(StringResponse(content.clone())) as Box<dyn ChatResponse>)
                }
                Err(message) => Err(LLMError::ProviderError(message.clone())),
            }
        })
    }

    fn chat_with_tools<'life0, 'life1, 'life2, 'async_trait>(
        &'life0 self,
        _messages: &'life1 [ChatMessage],
        _tools: Option<&'life2 [Tool]>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Box<dyn ChatResponse>, LLMError>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        'life2: 'async_trait,
        Self: 'async_trait,
    {
        panic!()
    }
}
