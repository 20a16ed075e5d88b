//! CloudFormation stack output lookup.

use serde::Deserialize;
use serde_json::Value;

use super::AwsControlPlane;
use super::error::AwsError;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksEnvelope {
    describe_stacks_response: DescribeStacksResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    describe_stacks_result: DescribeStacksResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResult {
    #[serde(default)]
    stacks: Vec<Stack>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Stack {
    #[serde(default)]
    outputs: Vec<StackOutput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackOutput {
    output_key: String,
    output_value: String,
}

fn find_output(response: Value, output_key: &str) -> Result<Option<String>, AwsError> {
    let envelope: DescribeStacksEnvelope =
        serde_json::from_value(response).map_err(|err| AwsError::Response {
            operation: String::from("DescribeStacks"),
            message: err.to_string(),
        })?;
    Ok(envelope
        .describe_stacks_response
        .describe_stacks_result
        .stacks
        .into_iter()
        .flat_map(|stack| stack.outputs)
        .find(|output| output.output_key == output_key)
        .map(|output| output.output_value))
}

fn is_missing_stack(err: &AwsError) -> bool {
    matches!(err, AwsError::Api { code, message, .. }
        if code == "ValidationError" && message.contains("does not exist"))
}

impl AwsControlPlane {
    pub(super) async fn describe_stack_output(
        &self,
        stack_name: &str,
        output_key: &str,
    ) -> Result<Option<String>, AwsError> {
        match self
            .client
            .cloudformation("DescribeStacks", &[("StackName", stack_name)])
            .await
        {
            Ok(response) => find_output(response, output_key),
            Err(err) if is_missing_stack(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
