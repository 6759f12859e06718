use mockito::Server;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tastebase::ingest::PageFetcher;
use tastebase::providers::{LlmProvider, OpenAIProvider, OpenAIVisionTranscriber};
use tastebase::{ParseMethod, RecipeParser, TastebaseError};

const JSON_LD_PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<script type="application/ld+json">
{
  "@context": "https://schema.org",
  "@graph": [
    {"@type": "WebPage", "name": "Best Pancakes"},
    {
      "@type": ["Recipe"],
      "name": "Fluffy Pancakes",
      "description": "Weekend breakfast &amp; brunch",
      "recipeYield": "4 servings",
      "prepTime": "PT10M",
      "cookTime": "PT15M",
      "recipeIngredient": ["1 1/2 cups flour", "2 eggs", "1 cup milk"],
      "recipeInstructions": [
        {"@type": "HowToStep", "text": "Whisk everything."},
        {"@type": "HowToStep", "text": "Fry in a hot pan."}
      ],
      "keywords": "breakfast, pancakes"
    }
  ]
}
</script>
</head><body><h1>Fluffy Pancakes</h1></body></html>"#;

const PLAIN_PAGE: &str = r#"<html><head><script>var tracking = 1;</script></head>
<body><nav>Home | Recipes</nav>
<article>
<h1>Garlic Butter Rice</h1>
<h2>Ingredients</h2>
<ul><li>1 cup rice</li><li>2 tbsp butter</li><li>3 cloves garlic</li></ul>
<h2>Instructions</h2>
<ol><li>Melt the butter.</li><li>Fry the garlic, add rice and water.</li></ol>
</article>
<footer>Copyright</footer></body></html>"#;

fn fetcher() -> PageFetcher {
    PageFetcher::new(Duration::from_secs(5), "TastebaseTest/1.0", 1024 * 1024).unwrap()
}

fn completion(content: &str) -> String {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
}

fn openai(server: &Server) -> Option<Arc<dyn LlmProvider>> {
    Some(Arc::new(OpenAIProvider::with_base_url(
        "test-key".into(),
        server.url(),
        "gpt-4o-mini".into(),
    )))
}

#[tokio::test]
async fn test_json_ld_page_skips_the_model() {
    let mut site = Server::new_async().await;
    let page = site
        .mock("GET", "/pancakes")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(JSON_LD_PAGE)
        .create_async()
        .await;

    let mut llm = Server::new_async().await;
    let never = llm
        .mock("POST", "/v1/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let parser = RecipeParser::new(fetcher(), openai(&llm), 4000);
    let url = format!("{}/pancakes", site.url());
    let outcome = parser.parse(&url).await.unwrap();

    assert_eq!(outcome.method, ParseMethod::JsonLd);
    assert_eq!(outcome.recipe.title, "Fluffy Pancakes");
    assert_eq!(outcome.recipe.description.as_deref(), Some("Weekend breakfast & brunch"));
    assert_eq!(outcome.recipe.servings, Some(4));
    assert_eq!(outcome.recipe.prep_time_minutes, Some(10));
    assert_eq!(outcome.recipe.ingredients.len(), 3);
    assert_eq!(outcome.recipe.instructions[1].text, "Fry in a hot pan.");
    assert_eq!(outcome.recipe.source_url.as_deref(), Some(url.as_str()));
    assert!(outcome.warnings.is_empty());

    page.assert_async().await;
    never.assert_async().await;
}

#[tokio::test]
async fn test_page_without_structured_data_goes_to_the_model() {
    let mut site = Server::new_async().await;
    let _page = site
        .mock("GET", "/rice")
        .with_status(200)
        .with_body(PLAIN_PAGE)
        .create_async()
        .await;

    let mut llm = Server::new_async().await;
    let call = llm
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::Regex("Garlic Butter Rice".into()))
        .with_status(200)
        .with_body(completion(
            r#"{"title": "Garlic Butter Rice", "servings": "2", "ingredients": [{"name": "rice", "quantity": 1, "unit": "cup"}], "instructions": ["Melt the butter.", "Cook the rice."], "difficulty": "Easy"}"#,
        ))
        .create_async()
        .await;

    let parser = RecipeParser::new(fetcher(), openai(&llm), 4000);
    let url = format!("{}/rice", site.url());
    let outcome = parser.parse(&url).await.unwrap();

    assert_eq!(outcome.method, ParseMethod::Llm);
    assert_eq!(outcome.recipe.servings, Some(2));
    assert_eq!(outcome.recipe.ingredients[0].quantity.as_deref(), Some("1"));
    assert_eq!(outcome.recipe.source_url.as_deref(), Some(url.as_str()));
    assert_eq!(outcome.source_url.as_deref(), Some(url.as_str()));
    assert_eq!(outcome.warnings.len(), 1);
    call.assert_async().await;
}

#[tokio::test]
async fn test_fetched_url_wins_over_model_source_url() {
    let mut site = Server::new_async().await;
    let _page = site
        .mock("GET", "/rice")
        .with_status(200)
        .with_body(PLAIN_PAGE)
        .create_async()
        .await;

    let mut llm = Server::new_async().await;
    let _call = llm
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(completion(
            r#"{"title": "Garlic Butter Rice", "source_url": "https://elsewhere.example/other", "ingredients": ["1 cup rice"], "instructions": ["Cook the rice."]}"#,
        ))
        .create_async()
        .await;

    let parser = RecipeParser::new(fetcher(), openai(&llm), 4000);
    let url = format!("{}/rice", site.url());
    let outcome = parser.parse(&url).await.unwrap();

    assert_eq!(outcome.method, ParseMethod::Llm);
    assert_eq!(outcome.recipe.source_url.as_deref(), Some(url.as_str()));
    assert_eq!(outcome.source_url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_unparseable_model_output_is_salvaged() {
    let mut llm = Server::new_async().await;
    let _call = llm
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(completion(
            "Sure! Here it is:\n{\"title\": \"Quick Salsa\", \"ingredients\": [\"3 tomatoes\", \"1 onion\"], \"instructions\": [\"Chop everything.\", \"Mix",
        ))
        .create_async()
        .await;

    let parser = RecipeParser::new(fetcher(), openai(&llm), 4000);
    let outcome = parser
        .parse("salsa: chop 3 tomatoes and an onion, mix")
        .await
        .unwrap();

    assert_eq!(outcome.method, ParseMethod::Salvage);
    assert_eq!(outcome.recipe.title, "Quick Salsa");
    assert_eq!(outcome.recipe.ingredients.len(), 2);
    assert!(outcome.recipe.validate().is_ok());
    assert!(outcome.source_url.is_none());
    assert!(!outcome.warnings.is_empty());
}

#[tokio::test]
async fn test_provider_failure_falls_back_to_salvage() {
    let mut llm = Server::new_async().await;
    let _call = llm
        .mock("POST", "/v1/chat/completions")
        .with_status(500)
        .with_body(r#"{"error": {"message": "overloaded"}}"#)
        .create_async()
        .await;

    let parser = RecipeParser::new(fetcher(), openai(&llm), 4000);
    let text = "Toast\n\nIngredients\n- 2 slices bread\n\nSteps\n1. Toast the bread.";
    let outcome = parser.parse(text).await.unwrap();

    assert_eq!(outcome.method, ParseMethod::Salvage);
    assert_eq!(outcome.recipe.title, "Toast");
    assert_eq!(outcome.recipe.instructions[0].text, "Toast the bread.");
    assert!(outcome.warnings.iter().any(|w| w.contains("AI extraction failed")));
}

#[tokio::test]
async fn test_model_refusal_is_an_error() {
    let mut llm = Server::new_async().await;
    let _call = llm
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(completion(r#"{"error": "this is a shopping list"}"#))
        .create_async()
        .await;

    let parser = RecipeParser::new(fetcher(), openai(&llm), 4000);
    let err = parser.parse("milk, eggs, batteries").await.unwrap_err();
    assert!(matches!(err, TastebaseError::NotARecipe(reason) if reason.contains("shopping")));
}

#[tokio::test]
async fn test_without_a_provider_text_is_salvaged() {
    let parser = RecipeParser::new(fetcher(), None, 4000);
    let outcome = parser.parse("Boil the kettle and pour over the tea bag.").await.unwrap();

    assert_eq!(outcome.method, ParseMethod::Salvage);
    assert_eq!(outcome.recipe.instructions.len(), 1);
    assert!(outcome.warnings[0].contains("No AI provider"));
}

#[tokio::test]
async fn test_fetch_failure_is_reported() {
    let mut site = Server::new_async().await;
    let _page = site
        .mock("GET", "/gone")
        .with_status(404)
        .create_async()
        .await;

    let parser = RecipeParser::new(fetcher(), None, 4000);
    let err = parser
        .parse(&format!("{}/gone", site.url()))
        .await
        .unwrap_err();
    assert!(matches!(err, TastebaseError::Fetch(_)));
}

#[tokio::test]
async fn test_empty_input_is_rejected() {
    let parser = RecipeParser::new(fetcher(), None, 4000);
    assert!(matches!(
        parser.parse("  ").await,
        Err(TastebaseError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_recipe_photo_is_transcribed_then_parsed() {
    let mut vision = Server::new_async().await;
    let call = vision
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::Regex("data:image/png;base64,".into()))
        .with_status(200)
        .with_body(completion(
            "Grandma's Scones\n\nIngredients\n- 2 cups flour\n- 1/2 cup butter\n\nMethod\n1. Rub the butter into the flour.\n2. Bake for 15 minutes.",
        ))
        .create_async()
        .await;

    let transcriber =
        OpenAIVisionTranscriber::with_base_url("key".into(), vision.url(), "gpt-4o-mini".into());
    let parser = RecipeParser::new(fetcher(), None, 4000).with_transcriber(Arc::new(transcriber));
    let outcome = parser
        .parse_image(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR")
        .await
        .unwrap();

    assert_eq!(outcome.method, ParseMethod::Salvage);
    assert_eq!(outcome.recipe.title, "Grandma's Scones");
    assert_eq!(outcome.recipe.ingredients.len(), 2);
    assert_eq!(outcome.recipe.instructions.len(), 2);
    assert!(outcome.source_url.is_none());
    call.assert_async().await;
}

#[tokio::test]
async fn test_non_image_photo_upload_is_rejected() {
    let transcriber = OpenAIVisionTranscriber::with_base_url(
        "key".into(),
        "http://127.0.0.1:9".into(),
        "gpt-4o-mini".into(),
    );
    let parser = RecipeParser::new(fetcher(), None, 4000).with_transcriber(Arc::new(transcriber));
    let err = parser.parse_image(b"plain text, not a photo").await.unwrap_err();
    assert!(matches!(err, TastebaseError::UnsupportedImage(_)));
}
