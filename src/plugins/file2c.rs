// src/plugins/file2c.rs

//! Embeds a data file into the generated project as a C byte array, with
//! optional lz4 compression of the payload. The classic use is baking small
//! assets (shaders, icons, license texts) straight into the binary.

use crate::core::file_builder::FileBuilder;
use crate::core::option_tree::{MarkedScalarNode, Node, OptionTree, scalar};
use crate::core::parser::ParseError;
use crate::core::paths;
use crate::core::project::GenerateError;
use crate::core::resolver::RunContext;
use crate::plugins::{CustomDirective, Plugin};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Lz4,
}

impl Compression {
    const VALID_NAMES: &'static [&'static str] = &["none", "lz4"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "lz4" => Some(Self::Lz4),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
        }
    }
}

pub struct File2CPlugin;

impl Plugin for File2CPlugin {
    fn process_directive(
        &self,
        base_path: &Path,
        key: &str,
        key_node: &MarkedScalarNode,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Option<Box<dyn CustomDirective>>, ParseError> {
        if key != "file2c" {
            return Ok(None);
        }

        let mapping = value.as_mapping().ok_or_else(|| {
            ParseError::at(tree.location(value), "Expected mapping.")
        })?;

        let mut input = None;
        let mut output = None;
        let mut identifier = None;
        let mut namespace = None;
        let mut compression = Compression::None;

        for (sub_key_node, sub_value) in mapping.iter() {
            let text = scalar(sub_value).ok_or_else(|| {
                ParseError::at(tree.location(sub_value), "Expected string.")
            })?;

            match sub_key_node.as_str() {
                "input" => {
                    let file = base_path.join(text);
                    if !file.exists() {
                        return Err(ParseError::at(
                            tree.location(sub_value),
                            format!(
                                "File \"{}\" does not exist.",
                                paths::canonicalize(&file).display()
                            ),
                        ));
                    }
                    input = Some(paths::canonicalize(&file));
                }
                "output" => {
                    if text.is_empty() {
                        return Err(ParseError::at(
                            tree.location(sub_value),
                            "Expected file name.",
                        ));
                    }
                    output = Some(text.to_string());
                }
                "identifier" => {
                    if text.is_empty() {
                        return Err(ParseError::at(
                            tree.location(sub_value),
                            "Expected identifier.",
                        ));
                    }
                    identifier = Some(text.to_string());
                }
                "namespace" => {
                    if text.is_empty() {
                        return Err(ParseError::at(
                            tree.location(sub_value),
                            "Expected identifier.",
                        ));
                    }
                    namespace = Some(text.to_string());
                }
                "compress" => {
                    compression = Compression::from_name(text).ok_or_else(|| {
                        ParseError::at(
                            tree.location(sub_value),
                            format!(
                                "Invalid compression method. Valid values are: \"{}\".",
                                Compression::VALID_NAMES.join("\", \"")
                            ),
                        )
                    })?;
                }
                other => {
                    return Err(ParseError::at(
                        tree.location_of_scalar(sub_key_node),
                        format!("Unknown option \"{other}\"."),
                    ));
                }
            }
        }

        let key_location = tree.location_of_scalar(key_node);
        let input = input.ok_or_else(|| {
            ParseError::at(key_location.clone(), "Missing input file name.")
        })?;
        let output = output.ok_or_else(|| {
            ParseError::at(key_location.clone(), "Missing output file name.")
        })?;
        let identifier = identifier
            .ok_or_else(|| ParseError::at(key_location, "Missing identifier name."))?;

        Ok(Some(Box::new(File2CDirective {
            input,
            output,
            identifier,
            namespace,
            compression,
        })))
    }
}

#[derive(Debug)]
struct File2CDirective {
    input: PathBuf,
    output: String,
    identifier: String,
    namespace: Option<String>,
    compression: Compression,
}

impl File2CDirective {
    fn write_namespace_begin(&self, builder: &mut FileBuilder) {
        if let Some(namespace) = &self.namespace {
            builder.append(&format!("namespace {namespace} {{\n"));
            builder.append_char('\n');
        }
    }

    fn write_namespace_end(&self, builder: &mut FileBuilder) {
        if let Some(namespace) = &self.namespace {
            builder.append_char('\n');
            builder.append(&format!("}} // namespace {namespace}\n"));
        }
    }
}

impl CustomDirective for File2CDirective {
    fn run(&self, run: &RunContext<'_>) -> Result<(), GenerateError> {
        let header_file = run
            .output_directory
            .join(format!("file2c/include/{}", self.output));
        let source_file = run
            .output_directory
            .join(format!("file2c/{}.cpp", self.output));

        // The fingerprint covers everything that changes how the input is
        // processed, so switching compression regenerates even when the input
        // file itself is untouched.
        let fingerprint = blake3::hash(self.compression.name().as_bytes());
        let input_changed = run
            .project
            .database()
            .did_input_file_change_with_fingerprint(&self.input, fingerprint.as_bytes())?;
        if !input_changed && header_file.exists() && source_file.exists() {
            return Ok(());
        }

        let raw = fs::read(&self.input)?;
        let data = match self.compression {
            Compression::None => raw,
            Compression::Lz4 => lz4_flex::compress_prepend_size(&raw),
        };

        let mut header = FileBuilder::for_file(header_file.clone());
        let mut source = FileBuilder::for_file(source_file.clone());

        for builder in [&mut header, &mut source] {
            builder.append("// ------------------------------------------------------\n");
            builder.append("// THIS IS AN AUTOMATICALLY GENERATED FILE. DO NOT EDIT!\n");
            builder.append("// ------------------------------------------------------\n");
            builder.append_char('\n');
        }

        header.append("#pragma once\n");
        header.append_char('\n');
        header.append("#include <cstdint>\n");
        header.append("#include <cstddef>\n");
        header.append_char('\n');

        let include = paths::relative_to(
            source_file.parent().unwrap_or(Path::new(".")),
            &header_file,
        );
        source.append(&format!(
            "#include \"{}\"\n",
            include.to_string_lossy().replace('\\', "/")
        ));
        source.append_char('\n');

        self.write_namespace_begin(&mut header);
        self.write_namespace_begin(&mut source);

        header.append(&format!(
            "enum : size_t {{ {}_size = {} }};\n",
            self.identifier,
            data.len()
        ));
        if self.compression == Compression::Lz4 {
            // The embedded payload is lz4 block data with the uncompressed
            // length prepended as a little-endian u32.
            header.append(&format!(
                "enum : size_t {{ {}_compression_lz4 = 1 }};\n",
                self.identifier
            ));
        }
        header.append(&format!(
            "extern const uint8_t {}[{}];\n",
            self.identifier,
            data.len()
        ));

        source.append(&format!(
            "const uint8_t {}[{}] = {{",
            self.identifier,
            data.len()
        ));
        for (index, byte) in data.iter().enumerate() {
            if index % 32 == 0 {
                source.append("\n    ");
            }
            source.append("0x");
            source.append_hex(*byte);
            source.append_char(',');
        }
        source.append("\n};\n");

        self.write_namespace_end(&mut header);
        self.write_namespace_end(&mut source);

        header.commit(run.project.database())?;
        source.commit(run.project.database())?;
        Ok(())
    }
}
