// src/core/template.rs

//! A minimal text-template engine for generator output files. Templates are
//! split once into literal and `@{variable}` segments and can then be emitted
//! any number of times with different variable sets.

use crate::core::file_builder::FileBuilder;
use crate::core::project::GenerateError;
use std::collections::HashMap;

enum Segment {
    Text(String),
    Variable(String),
}

pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut offset = 0;

        while let Some(begin) = text[offset..].find("@{") {
            let begin = offset + begin;
            let Some(end) = text[begin..].find('}') else {
                break;
            };
            let end = begin + end;

            if begin > offset {
                segments.push(Segment::Text(text[offset..begin].to_string()));
            }
            segments.push(Segment::Variable(text[begin + 2..end].to_string()));
            offset = end + 1;
        }

        if offset < text.len() {
            segments.push(Segment::Text(text[offset..].to_string()));
        }

        Self { segments }
    }

    /// Appends the rendered template to `builder`. Referencing a variable the
    /// caller did not supply is an error.
    pub fn emit(
        &self,
        builder: &mut FileBuilder,
        variables: &HashMap<String, String>,
    ) -> Result<(), GenerateError> {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => builder.append(text),
                Segment::Variable(name) => {
                    let value = variables.get(name).ok_or_else(|| {
                        GenerateError::UndeclaredTemplateVariable(name.clone())
                    })?;
                    builder.append(value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn render(template: &str, variables: &[(&str, &str)]) -> Result<String, GenerateError> {
        let variables: HashMap<String, String> = variables
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut builder = FileBuilder::for_file(PathBuf::from("unused"));
        Template::parse(template).emit(&mut builder, &variables)?;
        Ok(builder.buffered_text().to_string())
    }

    #[test]
    fn substitutes_variables_between_literals() {
        let output = render(
            "project(@{name})\n# for @{name} v@{version}\n",
            &[("name", "demo"), ("version", "1.2")],
        )
        .unwrap();
        assert_eq!(output, "project(demo)\n# for demo v1.2\n");
    }

    #[test]
    fn undeclared_variable_is_an_error() {
        let error = render("@{missing}", &[]).unwrap_err();
        assert!(error.to_string().contains("missing"));
    }

    #[test]
    fn text_without_placeholders_is_untouched() {
        let output = render("plain text, no vars", &[]).unwrap();
        assert_eq!(output, "plain text, no vars");
    }
}
