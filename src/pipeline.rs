use crate::config::AppConfig;
use crate::llm::{ChatApi, ChatMessage, ChatOptions, ContentPart, ImageUrl, LlmError};
use crate::models::{
    DegradedCause, FALLBACK_POSTAGE_WEIGHT_KG, FieldReport, FieldStatus, GenerateResponse,
    ImagePayload, ListingField, ListingRecord, MIN_POSTAGE_WEIGHT_KG, TITLE_MAX_CHARS,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{Duration, timeout};
use tracing::warn;

/// The analysis request never carries more than this many photos; extra
/// images in the submission are silently dropped.
pub const MAX_ANALYSIS_IMAGES: usize = 6;

const ANALYSIS_MAX_TOKENS: u32 = 1000;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an experienced marketplace listing assistant. \
Examine the product photos and report on: product type and brand, overall condition, \
key features and specifications, materials, dimensions where visible, any defects or \
wear, and an estimated value range. Be thorough and specific.";

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Upstream,
    Timeout,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn upstream(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Upstream,
        }
    }

    pub fn timeout(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Timeout,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

/// Failure of a single field generator. Never aborts the run; the
/// orchestrator substitutes a degraded value and reports the cause.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("upstream failure: {0}")]
    Upstream(#[from] LlmError),
    #[error("generator timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub analysis_timeout: Duration,
    pub field_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(60),
            field_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            analysis_timeout: Duration::from_secs(config.analysis_timeout_secs),
            field_timeout: Duration::from_secs(config.field_timeout_secs),
        }
    }
}

pub struct Pipeline<C> {
    chat: Arc<C>,
    vision_model: String,
    text_model: String,
    config: PipelineConfig,
}

impl<C: ChatApi> Pipeline<C> {
    pub fn new(
        chat: Arc<C>,
        vision_model: impl Into<String>,
        text_model: impl Into<String>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            chat,
            vision_model: vision_model.into(),
            text_model: text_model.into(),
            config,
        }
    }

    /// Run the full photos → listing pipeline. A failed analysis aborts the
    /// run before any field generator is invoked; a failed generator only
    /// degrades its own field.
    pub async fn generate(
        &self,
        images: &[ImagePayload],
        free_text: &str,
    ) -> Result<GenerateResponse, PipelineError> {
        if images.is_empty() {
            return Err(PipelineError::invalid_input("analyze", "no images provided"));
        }

        let started = Instant::now();
        let analysis = self.analyze(images, free_text).await?;
        crate::metrics::stage_elapsed("analyze", started.elapsed().as_millis());

        let started = Instant::now();
        let (title, description, category, weight) = tokio::join!(
            self.field(
                &generators::TITLE,
                generators::title_prompt(&analysis, free_text)
            ),
            self.field(
                &generators::DESCRIPTION,
                generators::description_prompt(&analysis, free_text)
            ),
            self.field(
                &generators::CATEGORY,
                generators::category_prompt(&analysis, free_text)
            ),
            self.field(
                &generators::WEIGHT,
                generators::weight_prompt(&analysis, free_text)
            ),
        );
        crate::metrics::stage_elapsed("generate_fields", started.elapsed().as_millis());

        let mut fields = Vec::with_capacity(4);

        let title = resolve_text_field(
            ListingField::Title,
            title,
            &mut fields,
            |raw| generators::normalize_title(raw),
            || generators::degraded_title(free_text),
        );
        let description = resolve_text_field(
            ListingField::Description,
            description,
            &mut fields,
            |raw| raw.trim().to_string(),
            || generators::degraded_description(free_text),
        );
        let category = resolve_text_field(
            ListingField::Category,
            category,
            &mut fields,
            |raw| raw.trim().to_string(),
            || generators::DEGRADED_CATEGORY.to_string(),
        );

        let postage_weight = match weight {
            Ok(raw) => match generators::parse_weight(&raw) {
                generators::WeightOutcome::Parsed(value) => {
                    fields.push(FieldReport::generated(ListingField::PostageWeight));
                    value
                }
                generators::WeightOutcome::Clamped { raw } => {
                    fields.push(FieldReport {
                        field: ListingField::PostageWeight,
                        status: FieldStatus::WeightClamped { raw },
                    });
                    MIN_POSTAGE_WEIGHT_KG
                }
                generators::WeightOutcome::Fallback => {
                    // Unparseable output is worth noticing: it usually means
                    // the model answered in prose, not that the item weighs
                    // half a kilo.
                    warn!(
                        target = "snaplist.pipeline",
                        raw = %raw.trim(),
                        "weight_output_unparseable"
                    );
                    fields.push(FieldReport {
                        field: ListingField::PostageWeight,
                        status: FieldStatus::WeightFallback {
                            raw: raw.trim().to_string(),
                        },
                    });
                    FALLBACK_POSTAGE_WEIGHT_KG
                }
            },
            Err(err) => {
                warn!(
                    target = "snaplist.pipeline",
                    field = "postage_weight",
                    error = %err,
                    "field_generator_degraded"
                );
                fields.push(degraded_report(ListingField::PostageWeight, &err));
                FALLBACK_POSTAGE_WEIGHT_KG
            }
        };

        Ok(GenerateResponse {
            record: ListingRecord {
                title,
                description,
                category,
                postage_weight,
                suggested_price: None,
            },
            fields,
        })
    }

    async fn analyze(
        &self,
        images: &[ImagePayload],
        free_text: &str,
    ) -> Result<String, PipelineError> {
        let messages = build_analysis_messages(images, free_text);
        let options = ChatOptions {
            model: self.vision_model.clone(),
            temperature: None,
            max_tokens: ANALYSIS_MAX_TOKENS,
        };
        match timeout(
            self.config.analysis_timeout,
            self.chat.chat(&messages, &options),
        )
        .await
        {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(PipelineError::upstream("analyze", err.to_string())),
            Err(_) => Err(PipelineError::timeout(
                "analyze",
                format!(
                    "no response within {}s",
                    self.config.analysis_timeout.as_secs()
                ),
            )),
        }
    }

    async fn field(
        &self,
        spec: &generators::GeneratorSpec,
        prompt: String,
    ) -> Result<String, GenerateError> {
        let messages = vec![ChatMessage::system(spec.system), ChatMessage::user(prompt)];
        let options = ChatOptions {
            model: self.text_model.clone(),
            temperature: Some(spec.temperature),
            max_tokens: spec.max_tokens,
        };
        match timeout(self.config.field_timeout, self.chat.chat(&messages, &options)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(GenerateError::Upstream(err)),
            Err(_) => Err(GenerateError::Timeout(self.config.field_timeout)),
        }
    }
}

fn resolve_text_field(
    field: ListingField,
    outcome: Result<String, GenerateError>,
    fields: &mut Vec<FieldReport>,
    normalize: impl FnOnce(&str) -> String,
    degraded: impl FnOnce() -> String,
) -> String {
    match outcome {
        Ok(raw) => {
            fields.push(FieldReport::generated(field));
            normalize(&raw)
        }
        Err(err) => {
            warn!(
                target = "snaplist.pipeline",
                field = ?field,
                error = %err,
                "field_generator_degraded"
            );
            fields.push(degraded_report(field, &err));
            degraded()
        }
    }
}

fn degraded_report(field: ListingField, err: &GenerateError) -> FieldReport {
    let cause = match err {
        GenerateError::Upstream(_) => DegradedCause::Upstream,
        GenerateError::Timeout(_) => DegradedCause::Timeout,
    };
    FieldReport {
        field,
        status: FieldStatus::Degraded {
            cause,
            reason: err.to_string(),
        },
    }
}

pub(crate) fn build_analysis_messages(
    images: &[ImagePayload],
    free_text: &str,
) -> Vec<ChatMessage> {
    let mut parts = vec![ContentPart::Text {
        text: format!("Analyze these product photos. Additional seller notes: {free_text}"),
    }];
    parts.extend(
        images
            .iter()
            .take(MAX_ANALYSIS_IMAGES)
            .map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", image.content_type, image.data),
                },
            }),
    );
    vec![
        ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
        ChatMessage::user_parts(parts),
    ]
}

pub mod generators {
    use super::{MIN_POSTAGE_WEIGHT_KG, TITLE_MAX_CHARS};

    pub struct GeneratorSpec {
        pub system: &'static str,
        pub temperature: f32,
        pub max_tokens: u32,
    }

    pub const TITLE: GeneratorSpec = GeneratorSpec {
        system: "You are an expert marketplace listing title writer.",
        temperature: 0.7,
        max_tokens: 100,
    };

    pub const DESCRIPTION: GeneratorSpec = GeneratorSpec {
        system: "You are an expert marketplace listing description writer.",
        temperature: 0.7,
        max_tokens: 2000,
    };

    pub const CATEGORY: GeneratorSpec = GeneratorSpec {
        system: "You are an expert marketplace category classifier.",
        temperature: 0.5,
        max_tokens: 100,
    };

    pub const WEIGHT: GeneratorSpec = GeneratorSpec {
        system: "You are an expert shipping weight estimator.",
        temperature: 0.3,
        max_tokens: 50,
    };

    /// Placeholder path used when the category generator fails; still honors
    /// the `"A > B"` shape the publisher and UI expect.
    pub const DEGRADED_CATEGORY: &str = "Everything Else > Other";

    pub fn title_prompt(analysis: &str, free_text: &str) -> String {
        format!(
            "Create an optimized marketplace listing title.\n\n\
             Product analysis: {analysis}\n\
             Seller notes: {free_text}\n\n\
             Rules:\n\
             - At most 80 characters\n\
             - Lead with brand, model, and condition\n\
             - Use the keywords buyers actually search for\n\
             - Include size, colour, or variant where it applies\n\
             - No promotional filler such as RARE or MUST SEE\n\n\
             Reply with the title only."
        )
    }

    pub fn description_prompt(analysis: &str, free_text: &str) -> String {
        format!(
            "Write the full marketplace listing description.\n\n\
             Product analysis: {analysis}\n\
             Seller notes: {free_text}\n\n\
             Structure it as: product overview and key features, detailed \
             specifications, honest condition notes, shipping and returns, \
             and a professional closing. Use HTML formatting: headed \
             sections, bullet lists for features, and bold for details \
             buyers must not miss."
        )
    }

    pub fn category_prompt(analysis: &str, free_text: &str) -> String {
        format!(
            "Pick the single best marketplace category for this product.\n\n\
             Product analysis: {analysis}\n\
             Seller notes: {free_text}\n\n\
             Answer in exactly this shape: \"Main Category > Subcategory > Specific Category\".\n\
             Examples:\n\
             - Electronics > Computers & Tablets > Laptops & Netbooks\n\
             - Fashion > Women's Clothing > Tops & Blouses\n\
             - Home & Garden > Kitchen, Dining & Bar > Small Kitchen Appliances\n\
             - Collectibles > Trading Cards > Sports Trading Cards\n\n\
             Reply with the category path only, as specific as the evidence allows."
        )
    }

    pub fn weight_prompt(analysis: &str, free_text: &str) -> String {
        format!(
            "Estimate the packed shipping weight of this product in kilograms.\n\n\
             Product analysis: {analysis}\n\
             Seller notes: {free_text}\n\n\
             Account for typical packaging materials (add 10-15%) and err \
             slightly high so the postage quote covers the real parcel.\n\
             Reply with the number only, e.g. 0.5 or 2.0."
        )
    }

    /// Titles longer than the marketplace limit are cut to exactly
    /// `TITLE_MAX_CHARS` characters; shorter titles pass through untouched.
    pub fn normalize_title(raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.chars().count() <= TITLE_MAX_CHARS {
            trimmed.to_string()
        } else {
            trimmed.chars().take(TITLE_MAX_CHARS).collect()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum WeightOutcome {
        Parsed(f64),
        Clamped { raw: f64 },
        Fallback,
    }

    pub fn parse_weight(raw: &str) -> WeightOutcome {
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= MIN_POSTAGE_WEIGHT_KG => {
                WeightOutcome::Parsed(value)
            }
            Ok(value) if value.is_finite() => WeightOutcome::Clamped { raw: value },
            _ => WeightOutcome::Fallback,
        }
    }

    pub fn degraded_title(free_text: &str) -> String {
        let trimmed = free_text.trim();
        if trimmed.is_empty() {
            "Untitled listing".to_string()
        } else {
            normalize_title(trimmed)
        }
    }

    pub fn degraded_description(free_text: &str) -> String {
        let trimmed = free_text.trim();
        if trimmed.is_empty() {
            "<p>Description unavailable. Please edit before publishing.</p>".to_string()
        } else {
            format!("<p>{trimmed}</p>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageContent;
    use std::sync::Mutex;

    struct ScriptedChat {
        calls: Mutex<Vec<(Vec<ChatMessage>, ChatOptions)>>,
        script: Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>,
    }

    impl ScriptedChat {
        fn new(script: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                script: Box::new(script),
            }
        }

        fn calls(&self) -> Vec<(Vec<ChatMessage>, ChatOptions)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ChatApi for ScriptedChat {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            options: &ChatOptions,
        ) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push((messages.to_vec(), options.clone()));
            let system = system_text(messages);
            (self.script)(&system)
        }
    }

    fn system_text(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .find(|message| message.role == "system")
            .map(|message| match &message.content {
                MessageContent::Text(text) => text.clone(),
                MessageContent::Parts(_) => String::new(),
            })
            .unwrap_or_default()
    }

    fn happy_script(system: &str) -> Result<String, LlmError> {
        if system.contains("product photos") {
            Ok("Vintage brown leather jacket, men's medium, light wear on cuffs.".into())
        } else if system.contains("title") {
            Ok("Vintage Brown Leather Jacket Men's M Good Condition Classic Biker Style".into())
        } else if system.contains("description") {
            Ok("<h2>Vintage Leather Jacket</h2><p>Soft brown leather with light wear.</p>".into())
        } else if system.contains("category") {
            Ok("Fashion > Men's Clothing > Coats & Jackets".into())
        } else if system.contains("weight") {
            Ok("1.4".into())
        } else {
            Err(LlmError::InvalidResponse(format!(
                "unexpected system prompt: {system}"
            )))
        }
    }

    fn images(count: usize) -> Vec<ImagePayload> {
        (0..count)
            .map(|index| ImagePayload {
                data: format!("img-{index}"),
                content_type: "image/jpeg".to_string(),
            })
            .collect()
    }

    fn image_urls(messages: &[ChatMessage]) -> Vec<String> {
        messages
            .iter()
            .filter_map(|message| match &message.content {
                MessageContent::Parts(parts) => Some(parts),
                MessageContent::Text(_) => None,
            })
            .flatten()
            .filter_map(|part| match part {
                ContentPart::ImageUrl { image_url } => Some(image_url.url.clone()),
                ContentPart::Text { .. } => None,
            })
            .collect()
    }

    fn test_pipeline(chat: Arc<ScriptedChat>) -> Pipeline<ScriptedChat> {
        Pipeline::new(chat, "vision-test", "text-test", PipelineConfig::default())
    }

    fn status_of(response: &GenerateResponse, field: ListingField) -> FieldStatus {
        response
            .fields
            .iter()
            .find(|report| report.field == field)
            .map(|report| report.status.clone())
            .expect("field report present")
    }

    #[test]
    fn analysis_request_caps_at_six_images() {
        let messages = build_analysis_messages(&images(8), "extra notes");
        let urls = image_urls(&messages);
        assert_eq!(urls.len(), 6);
        assert!(urls[0].ends_with("img-0"));
        assert!(urls[5].ends_with("img-5"));
        assert!(!urls.iter().any(|url| url.contains("img-6")));
    }

    #[test]
    fn analysis_request_inlines_content_type() {
        let payload = ImagePayload {
            data: "Zm9v".into(),
            content_type: "image/png".into(),
        };
        let messages = build_analysis_messages(std::slice::from_ref(&payload), "");
        let urls = image_urls(&messages);
        assert_eq!(urls, vec!["data:image/png;base64,Zm9v".to_string()]);
    }

    #[test]
    fn titles_over_the_limit_are_cut_to_exactly_eighty_chars() {
        let long: String = "a".repeat(101);
        let cut = generators::normalize_title(&long);
        assert_eq!(cut.chars().count(), 80);

        let exact: String = "b".repeat(80);
        assert_eq!(generators::normalize_title(&exact), exact);

        assert_eq!(generators::normalize_title("  Short title  "), "Short title");
    }

    #[test]
    fn weight_parsing_rules() {
        assert_eq!(
            generators::parse_weight("2.4"),
            generators::WeightOutcome::Parsed(2.4)
        );
        assert_eq!(
            generators::parse_weight(" 0.1 "),
            generators::WeightOutcome::Parsed(0.1)
        );
        assert_eq!(
            generators::parse_weight("0.02"),
            generators::WeightOutcome::Clamped { raw: 0.02 }
        );
        assert_eq!(
            generators::parse_weight("-1"),
            generators::WeightOutcome::Clamped { raw: -1.0 }
        );
        assert_eq!(
            generators::parse_weight("abc"),
            generators::WeightOutcome::Fallback
        );
        assert_eq!(
            generators::parse_weight("about 2 kg"),
            generators::WeightOutcome::Fallback
        );
    }

    #[tokio::test]
    async fn generate_happy_path_produces_complete_record() {
        let chat = Arc::new(ScriptedChat::new(happy_script));
        let pipeline = test_pipeline(chat.clone());

        let response = pipeline
            .generate(&images(6), "Vintage leather jacket, good condition")
            .await
            .expect("generate");

        assert!(!response.record.title.is_empty());
        assert!(response.record.title.chars().count() <= 80);
        assert!(response.record.category.contains(" > "));
        assert!(response.record.postage_weight >= MIN_POSTAGE_WEIGHT_KG);
        assert!(response.record.suggested_price.is_none());
        assert!(
            response
                .fields
                .iter()
                .all(|report| report.status == FieldStatus::Generated)
        );
        // one analysis call plus four generator calls
        assert_eq!(chat.calls().len(), 5);
    }

    #[tokio::test]
    async fn generate_sends_only_the_first_six_images() {
        let chat = Arc::new(ScriptedChat::new(happy_script));
        let pipeline = test_pipeline(chat.clone());

        pipeline
            .generate(&images(8), "")
            .await
            .expect("generate");

        let calls = chat.calls();
        let (analysis_messages, analysis_options) = &calls[0];
        assert_eq!(image_urls(analysis_messages).len(), 6);
        assert_eq!(analysis_options.model, "vision-test");
        assert_eq!(analysis_options.max_tokens, 1000);
    }

    #[tokio::test]
    async fn generate_rejects_empty_image_set() {
        let chat = Arc::new(ScriptedChat::new(happy_script));
        let pipeline = test_pipeline(chat.clone());

        let err = pipeline.generate(&[], "notes").await.expect_err("no images");
        assert_eq!(err.kind(), PipelineErrorKind::InvalidInput);
        assert!(chat.calls().is_empty());
    }

    #[tokio::test]
    async fn analysis_failure_aborts_before_any_generator_runs() {
        let chat = Arc::new(ScriptedChat::new(|system| {
            if system.contains("product photos") {
                Err(LlmError::Api {
                    status: 500,
                    message: "boom".into(),
                })
            } else {
                happy_script(system)
            }
        }));
        let pipeline = test_pipeline(chat.clone());

        let err = pipeline
            .generate(&images(2), "")
            .await
            .expect_err("analysis failed");
        assert_eq!(err.stage(), "analyze");
        assert_eq!(err.kind(), PipelineErrorKind::Upstream);
        assert_eq!(chat.calls().len(), 1, "no generator call after analysis failure");
    }

    #[tokio::test]
    async fn single_generator_failure_degrades_only_that_field() {
        let chat = Arc::new(ScriptedChat::new(|system| {
            if system.contains("category") {
                Err(LlmError::Http("connection reset".into()))
            } else {
                happy_script(system)
            }
        }));
        let pipeline = test_pipeline(chat.clone());

        let response = pipeline.generate(&images(1), "").await.expect("generate");

        assert_eq!(response.record.category, generators::DEGRADED_CATEGORY);
        assert!(response.record.category.contains(" > "));
        match status_of(&response, ListingField::Category) {
            FieldStatus::Degraded { cause, .. } => assert_eq!(cause, DegradedCause::Upstream),
            other => panic!("unexpected status: {other:?}"),
        }
        assert_eq!(
            status_of(&response, ListingField::Title),
            FieldStatus::Generated
        );
        assert_eq!(
            status_of(&response, ListingField::PostageWeight),
            FieldStatus::Generated
        );
    }

    #[tokio::test]
    async fn unparseable_weight_falls_back_to_half_a_kilo() {
        let chat = Arc::new(ScriptedChat::new(|system| {
            if system.contains("weight") {
                Ok("abc".into())
            } else {
                happy_script(system)
            }
        }));
        let pipeline = test_pipeline(chat);

        let response = pipeline.generate(&images(1), "").await.expect("generate");
        assert_eq!(response.record.postage_weight, FALLBACK_POSTAGE_WEIGHT_KG);
        assert_eq!(
            status_of(&response, ListingField::PostageWeight),
            FieldStatus::WeightFallback { raw: "abc".into() }
        );
    }

    #[tokio::test]
    async fn tiny_weight_is_clamped_to_the_minimum() {
        let chat = Arc::new(ScriptedChat::new(|system| {
            if system.contains("weight") {
                Ok("0.02".into())
            } else {
                happy_script(system)
            }
        }));
        let pipeline = test_pipeline(chat);

        let response = pipeline.generate(&images(1), "").await.expect("generate");
        assert_eq!(response.record.postage_weight, MIN_POSTAGE_WEIGHT_KG);
        assert_eq!(
            status_of(&response, ListingField::PostageWeight),
            FieldStatus::WeightClamped { raw: 0.02 }
        );
    }

    struct SlowTitleChat;

    impl ChatApi for SlowTitleChat {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<String, LlmError> {
            let system = system_text(messages);
            if system.contains("title") {
                tokio::time::sleep(Duration::from_millis(250)).await;
                Ok("too late".into())
            } else {
                happy_script(&system)
            }
        }
    }

    #[tokio::test]
    async fn generator_timeout_is_isolated_from_the_other_fields() {
        let config = PipelineConfig {
            analysis_timeout: Duration::from_secs(5),
            field_timeout: Duration::from_millis(50),
        };
        let pipeline = Pipeline::new(Arc::new(SlowTitleChat), "vision-test", "text-test", config);

        let response = pipeline
            .generate(&images(1), "boxed chess set")
            .await
            .expect("generate");

        match status_of(&response, ListingField::Title) {
            FieldStatus::Degraded { cause, .. } => assert_eq!(cause, DegradedCause::Timeout),
            other => panic!("unexpected status: {other:?}"),
        }
        assert_eq!(response.record.title, "boxed chess set");
        assert_eq!(
            status_of(&response, ListingField::Description),
            FieldStatus::Generated
        );
        assert_eq!(
            status_of(&response, ListingField::Category),
            FieldStatus::Generated
        );
        assert!(response.record.postage_weight >= MIN_POSTAGE_WEIGHT_KG);
    }
}
