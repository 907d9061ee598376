use super::*;
use models::ProviderChoice;

#[test]
fn provider_choice_parses_lowercase_names() {
    let gemini: ProviderChoice =
        serde_json::from_str("\"gemini\"").expect("Failed to parse gemini");
    let openai: ProviderChoice =
        serde_json::from_str("\"openai\"").expect("Failed to parse openai");

    assert_eq!(gemini, ProviderChoice::Gemini);
    assert_eq!(openai, ProviderChoice::Openai);
    assert_eq!(gemini.as_str(), "gemini");
    assert_eq!(openai.as_str(), "openai");
}

#[test]
fn unknown_provider_choice_is_rejected() {
    let result = serde_json::from_str::<ProviderChoice>("\"claude\"");
    assert!(result.is_err());
}

#[test]
fn question_request_provider_defaults_to_none() {
    let request: QuestionRequest =
        serde_json::from_str(r#"{"question": "What is the motor current?"}"#)
            .expect("Failed to parse request");
    assert_eq!(request.question, "What is the motor current?");
    assert!(request.provider.is_none());
}

#[test]
fn api_error_maps_to_status_codes() {
    assert_eq!(
        ApiError::bad_request("x").into_response().status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        ApiError::not_found("x").into_response().status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        ApiError::internal("x").into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn rag_errors_become_internal_errors() {
    let api_error = ApiError::from(RagError::Store("lock poisoned".to_string()));
    assert_eq!(
        api_error.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
