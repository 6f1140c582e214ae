//! Demonstration endpoints

use serde::{Deserialize, Serialize};
use typed_endpoints::{handle, handle_fallible, ErrorResponse, Method, Router};

/// Query model for `/example`
#[derive(Debug, Deserialize)]
pub struct ExampleQuery {
    #[serde(rename = "queryString")]
    pub query_string: String,
}

/// Body model for `/example`
#[derive(Debug, Default, Deserialize)]
pub struct ExampleBody {
    pub number: i64,
    pub bool: bool,
}

/// Response model for `/example`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExampleResponse {
    pub query_string: String,
    pub request_number: i64,
    pub request_bool: bool,
}

/// Echo the query string and body fields back
pub async fn example(query: ExampleQuery, body: ExampleBody) -> ExampleResponse {
    ExampleResponse {
        query_string: query.query_string,
        request_number: body.number,
        request_bool: body.bool,
    }
}

/// Query model for `/combine`
#[derive(Debug, Deserialize)]
pub struct StudentIdentifier {
    pub id: String,
}

/// Body model for `/combine`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub name: String,
    pub age: i32,
    pub score: f32,
    pub letter_score: u32,
    pub passed: bool,
}

/// Response model for `/combine`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub age: i32,
    pub score: f32,
    pub letter_score: u32,
    pub passed: bool,
}

/// Merge the student ID from the query with the student info from the body
///
/// A request without an `id` is answered with a 400 error response.
pub async fn combine(
    query: StudentIdentifier,
    body: StudentInfo,
) -> (Option<StudentRecord>, Option<ErrorResponse>) {
    if query.id.is_empty() {
        return (None, Some(ErrorResponse::bad_request("id is required")));
    }

    let record = StudentRecord {
        id: query.id,
        name: body.name,
        age: body.age,
        score: body.score,
        letter_score: body.letter_score,
        passed: body.passed,
    };
    (Some(record), None)
}

/// Register every demonstration endpoint
///
/// `None` registers on the process-wide router.
pub fn register(router: Option<&Router>) -> typed_endpoints::Result<()> {
    handle("/example", Method::Post, example, router)?;
    handle_fallible("/combine", Method::Post, combine, router)?;
    Ok(())
}
