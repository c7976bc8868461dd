//! XML codec for node/service configuration.
//!
//! The older persisted form: a `<nodeManagers>` root with one `<nodeManager
//! target="host">` per host, `<service name= launcher= count=>` children,
//! and `<cmd>`, `<arg>`, `<workingDirectory>`, `<description>`, and
//! `<environmentVariable key= sep=>` leaves. Defaults match the JSON codec:
//! absent `count` is 1, absent `launcher` is "generic".

use std::fmt;

use fg_core::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{EnvironmentVariable, NodeManager, NodeManagerConfig, NodeService};

pub fn from_xml(xml: &str) -> Result<NodeManagerConfig> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut decoder = XmlDecoder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => decoder.open(&e)?,
            Ok(Event::Empty(e)) => {
                decoder.open(&e)?;
                decoder.close(e.name().as_ref())?;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| invalid_xml(err))?;
                decoder.text(&text);
            }
            Ok(Event::End(e)) => decoder.close(e.name().as_ref())?,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(invalid_xml(e)),
        }
        buf.clear();
    }

    decoder.finish()
}

pub fn to_xml(config: &NodeManagerConfig) -> Result<String> {
    let bytes = write_config(config)
        .map_err(|e| Error::Internal(format!("node manager XML serialization failed: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Internal(format!("node manager XML serialization failed: {e}")))
}

// -- Decoding ----------------------------------------------------------------

/// Streaming decode state. The document is shallow, so one open service and
/// one open environment variable at a time is all the nesting there is.
#[derive(Default)]
struct XmlDecoder {
    config: NodeManagerConfig,
    service: Option<NodeService>,
    env_var: Option<EnvironmentVariable>,
    text_tag: String,
    saw_root: bool,
}

impl XmlDecoder {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<()> {
        if !self.saw_root {
            if e.name().as_ref() != b"nodeManagers" {
                return Err(Error::invalid_configuration(format!(
                    "expected a nodeManagers root element, found {}",
                    String::from_utf8_lossy(e.name().as_ref())
                )));
            }
            self.saw_root = true;
            return Ok(());
        }

        match e.name().as_ref() {
            b"nodeManager" => {
                let target = require_attr(e, "target")?;
                self.config.managers.push(NodeManager::new(target));
            }
            b"service" => {
                if self.service.is_some() {
                    return Err(Error::invalid_configuration(
                        "service elements cannot be nested".to_string(),
                    ));
                }
                if self.config.managers.is_empty() {
                    return Err(Error::invalid_configuration(
                        "service element outside of any nodeManager".to_string(),
                    ));
                }
                let mut service = NodeService::new(require_attr(e, "name")?, "");
                if let Some(launcher) = attr(e, "launcher")? {
                    service.launcher = launcher;
                }
                if let Some(count) = attr(e, "count")? {
                    service.count = count.parse().map_err(|_| {
                        Error::invalid_configuration(format!(
                            "service {} has an invalid count attribute: {count}",
                            service.name
                        ))
                    })?;
                }
                self.service = Some(service);
            }
            b"environmentVariable" => {
                if self.service.is_none() {
                    return Err(Error::invalid_configuration(
                        "environmentVariable element outside of any service".to_string(),
                    ));
                }
                self.env_var = Some(EnvironmentVariable {
                    key: require_attr(e, "key")?,
                    value: String::new(),
                    sep: attr(e, "sep")?,
                });
            }
            other => {
                self.text_tag = String::from_utf8_lossy(other).into_owned();
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(env_var) = &mut self.env_var {
            env_var.value.push_str(text);
            return;
        }
        let Some(service) = &mut self.service else {
            return;
        };
        match self.text_tag.as_str() {
            "cmd" => service.cmd = text.to_string(),
            "arg" => service.args.push(text.to_string()),
            "workingDirectory" => service.working_directory = Some(text.to_string()),
            "description" => service.description = Some(text.to_string()),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) -> Result<()> {
        match name {
            b"environmentVariable" => {
                if let (Some(service), Some(env_var)) = (&mut self.service, self.env_var.take()) {
                    service.env_vars.push(env_var);
                }
            }
            b"service" => {
                if let Some(service) = self.service.take() {
                    if service.cmd.is_empty() {
                        return Err(Error::invalid_configuration(format!(
                            "service {} has no cmd element",
                            service.name
                        )));
                    }
                    if let Some(manager) = self.config.managers.last_mut() {
                        manager.services.push(service);
                    }
                }
            }
            _ => self.text_tag.clear(),
        }
        Ok(())
    }

    fn finish(self) -> Result<NodeManagerConfig> {
        if self.service.is_some() || self.env_var.is_some() {
            return Err(invalid_xml("unexpected end of document"));
        }
        Ok(self.config)
    }
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| invalid_xml(err))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|err| invalid_xml(err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn require_attr(e: &BytesStart<'_>, name: &str) -> Result<String> {
    attr(e, name)?.ok_or_else(|| {
        Error::invalid_configuration(format!(
            "{} element is missing its {name} attribute",
            String::from_utf8_lossy(e.name().as_ref())
        ))
    })
}

fn invalid_xml(err: impl fmt::Display) -> Error {
    Error::invalid_configuration(format!("Invalid node manager XML: {err}"))
}

// -- Encoding ----------------------------------------------------------------

fn write_config(config: &NodeManagerConfig) -> quick_xml::Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

    writer.write_event(Event::Start(BytesStart::new("nodeManagers")))?;
    for manager in &config.managers {
        let mut open = BytesStart::new("nodeManager");
        open.push_attribute(("target", manager.target.as_str()));
        writer.write_event(Event::Start(open))?;

        for service in &manager.services {
            write_service(&mut writer, service)?;
        }

        writer.write_event(Event::End(BytesEnd::new("nodeManager")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("nodeManagers")))?;

    Ok(writer.into_inner())
}

fn write_service(writer: &mut Writer<Vec<u8>>, service: &NodeService) -> quick_xml::Result<()> {
    let mut open = BytesStart::new("service");
    open.push_attribute(("name", service.name.as_str()));
    open.push_attribute(("launcher", service.launcher.as_str()));
    let count = service.count.to_string();
    open.push_attribute(("count", count.as_str()));
    writer.write_event(Event::Start(open))?;

    write_text_element(writer, "cmd", &service.cmd)?;
    for arg in &service.args {
        write_text_element(writer, "arg", arg)?;
    }
    if let Some(dir) = &service.working_directory {
        write_text_element(writer, "workingDirectory", dir)?;
    }
    if let Some(description) = &service.description {
        write_text_element(writer, "description", description)?;
    }
    for env_var in &service.env_vars {
        let mut open = BytesStart::new("environmentVariable");
        open.push_attribute(("key", env_var.key.as_str()));
        if let Some(sep) = &env_var.sep {
            open.push_attribute(("sep", sep.as_str()));
        }
        writer.write_event(Event::Start(open))?;
        writer.write_event(Event::Text(BytesText::new(&env_var.value)))?;
        writer.write_event(Event::End(BytesEnd::new("environmentVariable")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("service")))?;
    Ok(())
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    text: &str,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
