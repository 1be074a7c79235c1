use std::fs;
use std::path::{Path, PathBuf};

use crate::dependent_builder::{quote_ident, ViewData, ViewGrant};
use crate::error::ScriptError;

const ALL_PRIVILEGES: [&str; 7] = [
    "INSERT",
    "SELECT",
    "UPDATE",
    "DELETE",
    "TRUNCATE",
    "REFERENCES",
    "TRIGGER",
];

/// Metadata stamped into every generated changelog.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub author: String,
    pub id: String,
    pub out_dir: PathBuf,
    /// File name pattern with `{id}`, `{name}`, `{schema}` and `{author}`
    /// placeholders, relative to `out_dir`.
    pub filename_format: Option<String>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            author: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            id: chrono::Utc::now().timestamp_millis().to_string(),
            out_dir: PathBuf::from("dist"),
            filename_format: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScriptBuilder<'a> {
    pub options: &'a MigrationOptions,
    pub file_buffer: String,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(options: &'a MigrationOptions) -> Self {
        Self {
            options,
            file_buffer: String::new(),
        }
    }

    pub fn has_all_privileges(privileges: &str) -> bool {
        return ALL_PRIVILEGES
            .iter()
            .all(|action| privileges.contains(action));
    }

    // PUBLIC is a keyword, not a role, and must stay unquoted
    fn grantee_sql(grantee: &str) -> String {
        if grantee == "PUBLIC" {
            return grantee.to_string();
        }
        return quote_ident(grantee);
    }

    fn escape_attr(value: &str) -> String {
        value
            .replace('&', "&amp;")
            .replace('"', "&quot;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    fn cdata(value: &str) -> String {
        format!("<![CDATA[{}]]>", value.replace("]]>", "]]]]><![CDATA[>"))
    }

    pub fn display(&self) {
        println!("{}", self.file_buffer);
    }

    pub fn add_buffer_line(&mut self, content: &str) {
        self.file_buffer.push_str(content);
        self.file_buffer.push('\n');
    }

    pub fn save_file(&self, file_path: &Path) -> Result<(), ScriptError> {
        let write_err = |source| ScriptError::Write {
            path: file_path.to_path_buf(),
            source,
        };
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(file_path, &self.file_buffer).map_err(write_err)?;
        return Ok(());
    }

    pub fn get_delete_script(obj_name: &str) -> String {
        return format!("DROP VIEW IF EXISTS {obj_name};");
    }

    /// Ownership line followed by one GRANT per grantee.
    pub fn get_permissions_script(view: &ViewData, grants: &[ViewGrant]) -> String {
        let qualified = view.get_qualified_name();
        let mut lines = vec![format!(
            "ALTER TABLE {} OWNER TO {}",
            qualified,
            quote_ident(&view.view_owner)
        )];
        for grant in grants {
            if grant.privileges.trim().is_empty() {
                continue;
            }
            let privileges = if Self::has_all_privileges(&grant.privileges) {
                "ALL"
            } else {
                grant.privileges.as_str()
            };
            lines.push(format!(
                "GRANT {} ON TABLE {} TO {}",
                privileges,
                qualified,
                Self::grantee_sql(&grant.grantee)
            ));
        }
        return lines.join("\n");
    }

    pub fn get_filename(&self, view: &ViewData) -> PathBuf {
        let file_name = match &self.options.filename_format {
            Some(pattern) => pattern
                .replace("{id}", &self.options.id)
                .replace("{name}", &view.view_name)
                .replace("{schema}", &view.schema_name)
                .replace("{author}", &self.options.author),
            None => format!("{}-{}.xml", self.options.id, view.view_name),
        };
        return self.options.out_dir.join(file_name);
    }

    /// Fills the buffer with a Liquibase changelog recreating `view`.
    pub fn build_migration(&mut self, view: &ViewData, permissions: &str) {
        let id = Self::escape_attr(&format!("{}-{}", self.options.id, view.view_name));
        let author = Self::escape_attr(&self.options.author);
        let name = Self::escape_attr(&view.view_name);
        let schema = Self::escape_attr(&view.schema_name);

        self.add_buffer_line(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        self.add_buffer_line(r#"<databaseChangeLog xmlns="http://www.liquibase.org/xml/ns/dbchangelog""#);
        self.add_buffer_line(r#"    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#);
        self.add_buffer_line(r#"    xsi:schemaLocation="http://www.liquibase.org/xml/ns/dbchangelog http://www.liquibase.org/xml/ns/dbchangelog/dbchangelog-3.8.xsd">"#);
        self.add_buffer_line(&format!(
            r#"    <changeSet id="{id}" author="{author}" runOnChange="true">"#
        ));
        self.add_buffer_line(&format!(
            r#"        <createView viewName="{name}" schemaName="{schema}" replaceIfExists="true">{}</createView>"#,
            Self::cdata(view.definition.trim())
        ));
        self.add_buffer_line(&format!("        <sql>{}</sql>", Self::cdata(permissions)));
        self.add_buffer_line("    </changeSet>");
        self.add_buffer_line("</databaseChangeLog>");
    }

    /// Drop statements for `names`, one per line, in the given order.
    pub fn build_drop_script<'n>(&mut self, names: impl IntoIterator<Item = &'n str>) {
        for name in names {
            let line = Self::get_delete_script(name);
            self.add_buffer_line(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn orders_vw() -> ViewData {
        ViewData {
            schema_name: "public".into(),
            view_name: "orders_vw".into(),
            view_owner: "app_owner".into(),
            definition: " SELECT o.id FROM orders o WHERE o.total > 0;".into(),
        }
    }

    fn options() -> MigrationOptions {
        MigrationOptions {
            author: "dba".into(),
            id: "1700000000000".into(),
            out_dir: PathBuf::from("dist"),
            filename_format: None,
        }
    }

    #[test]
    fn all_privileges_collapse_to_all() {
        let grants = vec![
            ViewGrant {
                grantee: "app_owner".into(),
                privileges: "DELETE, INSERT, REFERENCES, SELECT, TRIGGER, TRUNCATE, UPDATE".into(),
            },
            ViewGrant {
                grantee: "reporting".into(),
                privileges: "SELECT".into(),
            },
            ViewGrant {
                grantee: "nobody".into(),
                privileges: "".into(),
            },
        ];

        assert_eq!(
            ScriptBuilder::get_permissions_script(&orders_vw(), &grants),
            "ALTER TABLE public.orders_vw OWNER TO app_owner\n\
             GRANT ALL ON TABLE public.orders_vw TO app_owner\n\
             GRANT SELECT ON TABLE public.orders_vw TO reporting"
        );
    }

    #[test]
    fn permissions_target_quoted_schema_and_view() {
        let view = ViewData {
            schema_name: "Sales".into(),
            view_name: "Monthly Totals".into(),
            view_owner: "ReportOwner".into(),
            definition: "SELECT 1".into(),
        };
        let grants = vec![
            ViewGrant {
                grantee: "Analysts".into(),
                privileges: "SELECT".into(),
            },
            ViewGrant {
                grantee: "PUBLIC".into(),
                privileges: "SELECT".into(),
            },
        ];

        assert_eq!(
            ScriptBuilder::get_permissions_script(&view, &grants),
            "ALTER TABLE \"Sales\".\"Monthly Totals\" OWNER TO \"ReportOwner\"\n\
             GRANT SELECT ON TABLE \"Sales\".\"Monthly Totals\" TO \"Analysts\"\n\
             GRANT SELECT ON TABLE \"Sales\".\"Monthly Totals\" TO PUBLIC"
        );
    }

    #[test]
    fn default_filename_uses_id_and_view() {
        let options = options();
        let builder = ScriptBuilder::new(&options);
        assert_eq!(
            builder.get_filename(&orders_vw()),
            PathBuf::from("dist/1700000000000-orders_vw.xml")
        );
    }

    #[test]
    fn custom_filename_pattern() {
        let options = MigrationOptions {
            filename_format: Some("{schema}/{author}-{name}-{id}.xml".into()),
            ..options()
        };
        let builder = ScriptBuilder::new(&options);
        assert_eq!(
            builder.get_filename(&orders_vw()),
            PathBuf::from("dist/public/dba-orders_vw-1700000000000.xml")
        );
    }

    #[test]
    fn migration_wraps_definition_and_permissions() {
        let options = options();
        let mut builder = ScriptBuilder::new(&options);
        builder.build_migration(&orders_vw(), "ALTER TABLE orders_vw OWNER TO app_owner");

        let contents = &builder.file_buffer;
        assert!(contents.contains(r#"<changeSet id="1700000000000-orders_vw" author="dba" runOnChange="true">"#));
        assert!(contents.contains(
            "<![CDATA[SELECT o.id FROM orders o WHERE o.total > 0;]]></createView>"
        ));
        assert!(contents.contains("<sql><![CDATA[ALTER TABLE orders_vw OWNER TO app_owner]]></sql>"));
        assert!(contents.trim_end().ends_with("</databaseChangeLog>"));
    }

    #[test]
    fn cdata_terminator_is_split() {
        assert_eq!(ScriptBuilder::cdata("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
    }

    #[test]
    fn drop_script_follows_given_order() {
        let options = options();
        let mut builder = ScriptBuilder::new(&options);
        builder.build_drop_script(["summary_vw", "orders_vw"]);
        assert_eq!(
            builder.file_buffer,
            "DROP VIEW IF EXISTS summary_vw;\nDROP VIEW IF EXISTS orders_vw;\n"
        );
    }

    #[test]
    fn save_file_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let options = MigrationOptions {
            out_dir: dir.path().join("nested"),
            ..options()
        };
        let mut builder = ScriptBuilder::new(&options);
        builder.add_buffer_line("<databaseChangeLog/>");
        let path = builder.get_filename(&orders_vw());

        builder.save_file(&path).unwrap();

        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "<databaseChangeLog/>\n"
        );
    }
}
