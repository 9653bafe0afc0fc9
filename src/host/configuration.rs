//! Job configuration documents
//!
//! Every job is described by an XML document, readable at
//! `<server>/job/<name>/config.xml`. Changing any setting means sending the
//! whole document back; [`Configuration`] edits the document locally and
//! [`Job::apply`](super::Job::apply) pushes it.

use std::fmt;

use crate::client::{JenkinsError, JenkinsResult};

use super::xml::{self, Node};

const XML_HEADER: &str = "<?xml version='1.1' encoding='UTF-8'?>\n";
const SHELL_STEP: &str = "hudson.tasks.Shell";

fn invalid(reason: impl Into<String>) -> JenkinsError {
    JenkinsError::InvalidConfig(reason.into())
}

/// Editable view of a freestyle project `config.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    xml: String,
}

impl Configuration {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`JenkinsError::InvalidConfig`] when the document is not
    /// well-formed or its root is not `<project>`.
    pub fn parse(xml: impl Into<String>) -> JenkinsResult<Self> {
        let xml = xml.into();
        let root = xml::root(&xml).map_err(invalid)?;
        if root.name != "project" {
            return Err(invalid(format!(
                "expected a <project> document, found <{}>",
                root.name
            )));
        }
        Ok(Self { xml })
    }

    fn root(&self) -> JenkinsResult<Node> {
        xml::root(&self.xml).map_err(invalid)
    }

    fn field(&self, name: &str) -> JenkinsResult<Option<String>> {
        let root = self.root()?;
        let node = xml::child(&self.xml, &root, name).map_err(invalid)?;
        Ok(node.map(|n| xml::unescape(n.text(&self.xml))))
    }

    fn flag(&self, name: &str) -> JenkinsResult<bool> {
        Ok(self
            .field(name)?
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")))
    }

    fn set_field(&mut self, name: &str, value: &str) -> JenkinsResult<()> {
        let element = format!("<{name}>{}</{name}>", xml::escape(value));
        let root = self.root()?;
        match xml::child(&self.xml, &root, name).map_err(invalid)? {
            Some(node) => self.xml.replace_range(node.span, &element),
            None => self.insert_child(&root, &element)?,
        }
        Ok(())
    }

    fn insert_child(&mut self, root: &Node, element: &str) -> JenkinsResult<()> {
        match &root.inner {
            Some(inner) => self.xml.insert_str(inner.end, &format!("  {element}\n")),
            None => {
                let replacement = format!("<{0}>\n  {element}\n</{0}>", root.name);
                self.xml.replace_range(root.span.clone(), &replacement);
            }
        }
        Ok(())
    }

    /// Job description (empty when unset)
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn description(&self) -> JenkinsResult<String> {
        Ok(self.field("description")?.unwrap_or_default())
    }

    /// Sets the job description
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn set_description(&mut self, description: &str) -> JenkinsResult<()> {
        self.set_field("description", description)
    }

    /// Whether the job may run on any node
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn can_roam(&self) -> JenkinsResult<bool> {
        self.flag("canRoam")
    }

    /// Sets roaming
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn set_can_roam(&mut self, value: bool) -> JenkinsResult<()> {
        self.set_field("canRoam", &value.to_string())
    }

    /// Whether the job is disabled
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn disabled(&self) -> JenkinsResult<bool> {
        self.flag("disabled")
    }

    /// Enables or disables the job
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn set_disabled(&mut self, value: bool) -> JenkinsResult<()> {
        self.set_field("disabled", &value.to_string())
    }

    /// Whether builds of this job may run concurrently
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn concurrent_build(&self) -> JenkinsResult<bool> {
        self.flag("concurrentBuild")
    }

    /// Allows or forbids concurrent builds
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn set_concurrent_build(&mut self, value: bool) -> JenkinsResult<()> {
        self.set_field("concurrentBuild", &value.to_string())
    }

    /// The build steps of the job
    ///
    /// # Errors
    ///
    /// Returns [`JenkinsError::InvalidConfig`] when the `<builders>` element
    /// cannot be read.
    pub fn build_steps(&self) -> JenkinsResult<BuildSteps> {
        let root = self.root()?;
        let Some(builders) = xml::child(&self.xml, &root, "builders").map_err(invalid)? else {
            return Ok(BuildSteps::default());
        };
        let Some(inner) = builders.inner else {
            return Ok(BuildSteps::default());
        };

        let steps = xml::children(&self.xml, inner)
            .map_err(invalid)?
            .into_iter()
            .map(|node| BuildStep {
                raw: self.xml[node.span].to_string(),
            })
            .collect();
        Ok(BuildSteps { steps })
    }

    /// Replaces the build steps of the job
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn set_build_steps(&mut self, steps: &BuildSteps) -> JenkinsResult<()> {
        let rendered = steps.render();
        let root = self.root()?;
        match xml::child(&self.xml, &root, "builders").map_err(invalid)? {
            Some(node) => self.xml.replace_range(node.span, &rendered),
            None => self.insert_child(&root, &rendered)?,
        }
        Ok(())
    }

    /// Reads, edits and writes back the build steps in one go
    ///
    /// # Errors
    ///
    /// Fails if the document has been corrupted.
    pub fn update_build_steps(&mut self, edit: impl FnOnce(&mut BuildSteps)) -> JenkinsResult<()> {
        let mut steps = self.build_steps()?;
        edit(&mut steps);
        self.set_build_steps(&steps)
    }

    /// The document, with an XML declaration
    #[must_use]
    pub fn to_xml(&self) -> String {
        if self.xml.trim_start().starts_with("<?xml") {
            self.xml.clone()
        } else {
            format!("{XML_HEADER}{}", self.xml)
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

/// One entry of `<builders>`, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    raw: String,
}

impl BuildStep {
    /// A shell step running `script`
    #[must_use]
    pub fn shell(script: &str) -> Self {
        Self {
            raw: format!(
                "<{SHELL_STEP}>\n      <command>{}</command>\n    </{SHELL_STEP}>",
                xml::escape(script)
            ),
        }
    }

    fn node(&self) -> Option<Node> {
        xml::root(&self.raw).ok()
    }

    /// Java class of the step, e.g. `hudson.tasks.Shell`
    #[must_use]
    pub fn kind(&self) -> String {
        self.node().map(|n| n.name).unwrap_or_default()
    }

    /// Script of a shell step, `None` for other step types
    #[must_use]
    pub fn script(&self) -> Option<String> {
        let node = self.node().filter(|n| n.name == SHELL_STEP)?;
        let command = xml::child(&self.raw, &node, "command").ok()??;
        Some(xml::unescape(command.text(&self.raw)))
    }

    fn set_script(&mut self, script: &str) {
        let command = self
            .node()
            .filter(|n| n.name == SHELL_STEP)
            .and_then(|node| xml::child(&self.raw, &node, "command").ok().flatten());
        match command {
            Some(command) => {
                let element = format!("<command>{}</command>", xml::escape(script));
                self.raw.replace_range(command.span, &element);
            }
            None => *self = Self::shell(script),
        }
    }
}

/// The ordered build steps of a job.
///
/// Only shell steps are editable as scripts; other step types are carried
/// along untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSteps {
    steps: Vec<BuildStep>,
}

impl BuildSteps {
    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there are no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Appends a shell step
    pub fn add(&mut self, script: &str) {
        self.steps.push(BuildStep::shell(script));
    }

    /// Script of the step at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<String> {
        self.steps.get(index).and_then(BuildStep::script)
    }

    /// Step at `index`
    #[must_use]
    pub fn step(&self, index: usize) -> Option<&BuildStep> {
        self.steps.get(index)
    }

    /// Replaces the script of the step at `index`; a non-shell step is
    /// replaced by a shell step. Returns false when out of range.
    pub fn set(&mut self, index: usize, script: &str) -> bool {
        match self.steps.get_mut(index) {
            Some(step) => {
                step.set_script(script);
                true
            }
            None => false,
        }
    }

    /// Removes the step at `index`
    pub fn remove(&mut self, index: usize) -> Option<BuildStep> {
        (index < self.steps.len()).then(|| self.steps.remove(index))
    }

    /// Iterates over the steps
    pub fn iter(&self) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter()
    }

    fn render(&self) -> String {
        if self.steps.is_empty() {
            return "<builders/>".to_string();
        }
        let mut out = String::from("<builders>\n");
        for step in &self.steps {
            out.push_str("    ");
            out.push_str(&step.raw);
            out.push('\n');
        }
        out.push_str("  </builders>");
        out
    }
}

impl fmt::Display for BuildSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.len() {
            0 => f.write_str("no build steps"),
            1 => f.write_str(&self.get(0).unwrap_or_default()),
            n => write!(f, "{n} steps"),
        }
    }
}
