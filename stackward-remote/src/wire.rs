//! Request/response bodies and routes of the orchestration API.

use serde::{Deserialize, Serialize};

/// Stack type for compose stacks on standalone targets.
pub const STACK_TYPE_COMPOSE: u8 = 2;

/// Creation method: definition supplied inline as text.
pub const CREATE_METHOD_STRING: &str = "string";

/// `GET /api/stacks/{id}/file`.
#[derive(Debug, Clone, Deserialize)]
pub struct StackFileResponse {
    #[serde(rename = "StackFileContent")]
    pub stack_file_content: String,
}

/// `PUT /api/stacks/{id}`. Replaces the whole definition.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStackBody<'a> {
    #[serde(rename = "stackFileContent")]
    pub stack_file_content: &'a str,
    #[serde(rename = "pullImage")]
    pub pull_image: bool,
}

/// `POST /api/stacks`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateStackBody<'a> {
    #[serde(rename = "Name")]
    pub name: &'a str,
    #[serde(rename = "StackFileContent")]
    pub stack_file_content: &'a str,
}

/// URL builder rooted at the API base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    base: String,
}

impl Routes {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoints(&self) -> String {
        format!("{}/api/endpoints", self.base)
    }

    pub fn stacks(&self) -> String {
        format!("{}/api/stacks", self.base)
    }

    pub fn stack_file(&self, unit_id: i64) -> String {
        format!("{}/api/stacks/{unit_id}/file", self.base)
    }

    pub fn update_stack(&self, unit_id: i64, target_id: i64) -> String {
        format!("{}/api/stacks/{unit_id}?endpointId={target_id}", self.base)
    }

    pub fn create_stack(&self, target_id: i64) -> String {
        format!(
            "{}/api/stacks?type={STACK_TYPE_COMPOSE}&method={CREATE_METHOD_STRING}&endpointId={target_id}",
            self.base
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::endpoints(Routes::endpoints, "/api/endpoints")]
    #[case::stacks(Routes::stacks, "/api/stacks")]
    #[case::stack_file(|r: &Routes| r.stack_file(9), "/api/stacks/9/file")]
    #[case::update(|r: &Routes| r.update_stack(9, 3), "/api/stacks/9?endpointId=3")]
    #[case::create(
        |r: &Routes| r.create_stack(3),
        "/api/stacks?type=2&method=string&endpointId=3"
    )]
    fn routes_follow_api_contract(
        #[case] route: fn(&Routes) -> String,
        #[case] path: &str,
    ) {
        let routes = Routes::new("http://remote:9000/");
        assert_eq!(route(&routes), format!("http://remote:9000{path}"));
    }

    #[test]
    fn bodies_use_remote_field_names() {
        let update = serde_json::to_value(UpdateStackBody {
            stack_file_content: "services: {}\n",
            pull_image: true,
        })
        .expect("encode");
        assert_eq!(
            update,
            json!({"stackFileContent": "services: {}\n", "pullImage": true})
        );

        let create = serde_json::to_value(CreateStackBody {
            name: "app",
            stack_file_content: "x",
        })
        .expect("encode");
        assert_eq!(create, json!({"Name": "app", "StackFileContent": "x"}));
    }

    #[test]
    fn file_response_decodes() {
        let body: StackFileResponse =
            serde_json::from_str(r#"{"StackFileContent":"version: '3'\n"}"#).expect("decode");
        assert_eq!(body.stack_file_content, "version: '3'\n");
    }
}
