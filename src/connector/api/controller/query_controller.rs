use std::io::Read;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value as Json};

use super::super::graphql::Request;
use super::super::Container;

pub struct QueryController<'a> {
    container: &'a Container,
}

impl<'a> QueryController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Execute `query` (or stdin when it is `-`) and render the response
    /// as pretty-printed JSON.
    pub async fn query(
        &self,
        query: String,
        variables: Option<String>,
        operation: Option<String>,
    ) -> Result<String> {
        let query = if query == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read query from stdin")?;
            buf
        } else {
            query
        };

        let mut request = Request::new(query);
        if let Some(raw) = variables {
            request = request.variables(parse_variables(&raw)?);
        }
        if let Some(name) = operation {
            request = request.operation_name(name);
        }

        let response = self.container.engine().execute(request).await;
        serde_json::to_string_pretty(&response).context("failed to serialize response")
    }
}

fn parse_variables(raw: &str) -> Result<Map<String, Json>> {
    let value: Json = serde_json::from_str(raw).context("variables are not valid JSON")?;
    match value {
        Json::Object(map) => Ok(map),
        Json::Null => Ok(Map::new()),
        other => bail!("variables must be a JSON object, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables_accepts_objects_only() {
        let map = parse_variables(r#"{"rev": "main"}"#).unwrap();
        assert_eq!(map["rev"], "main");
        assert!(parse_variables("null").unwrap().is_empty());
        assert!(parse_variables("[1]").is_err());
        assert!(parse_variables("{").is_err());
    }
}
