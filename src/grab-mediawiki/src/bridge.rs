//! `WikiBridge` implementation for MediaWiki.
//!
//! `upload_article` reconciles the request against the live article and
//! performs one write sequence:
//!
//! | section | section exists | clobber | writes |
//! |---|---|---|---|
//! | none | - | no | append to article (create if missing) |
//! | none | - | yes | replace article |
//! | given | no | - | new section |
//! | given | yes | no | append into section |
//! | given | yes | yes | blank section, then new section at the end |
//!
//! Nothing is rolled back if the second write of the last row fails.

use std::path::Path;

use async_trait::async_trait;
use grab_core::{
    ArticleReceipt, BridgeResult, TranscriptSyntax, WikiBridge, WikiCredentials, WriteAction,
};
use tracing::{info, warn};

use crate::client::{Edit, EditMode, EditTarget, MediaWikiClient, WikiApi};
use crate::error::{WikiError, WikiResult};

/// Separator placed before appended text.
const APPEND_SEPARATOR: &str = "\n\n";

/// MediaWiki destination for one publish run.
#[derive(Debug)]
pub struct MediaWikiBridge<A> {
    api: A,
}

impl MediaWikiBridge<MediaWikiClient> {
    /// Bridge over a fresh Action API session for the given account.
    pub fn connect(credentials: WikiCredentials) -> WikiResult<Self> {
        Ok(Self::new(MediaWikiClient::new(credentials)?))
    }
}

impl<A: WikiApi> MediaWikiBridge<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The underlying API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Decide and perform the writes for one request.
    async fn reconcile(
        &self,
        title: &str,
        section: &str,
        body: &str,
        clobber: bool,
    ) -> WikiResult<WriteAction> {
        let article = self.api.query_article(title).await?;
        let section_index = if section.is_empty() || !article.exists {
            None
        } else {
            self.api.query_section(title, section).await?
        };

        let edit = |target: EditTarget, mode: EditMode, text: String| Edit {
            title: title.to_string(),
            target,
            mode,
            text,
        };

        let action = match (section.is_empty(), section_index, clobber) {
            (true, _, false) if article.exists => {
                self.api
                    .edit_article(&edit(
                        EditTarget::Article,
                        EditMode::Append,
                        format!("{APPEND_SEPARATOR}{body}"),
                    ))
                    .await?;
                WriteAction::AppendedArticle
            }
            (true, _, clobber) => {
                self.api
                    .edit_article(&edit(EditTarget::Article, EditMode::Replace, body.to_string()))
                    .await?;
                if clobber && article.exists {
                    WriteAction::ReplacedArticle
                } else {
                    WriteAction::CreatedArticle
                }
            }
            (false, None, _) => {
                self.api
                    .edit_article(&edit(
                        EditTarget::NewSection(section.to_string()),
                        EditMode::Replace,
                        body.to_string(),
                    ))
                    .await?;
                WriteAction::CreatedSection
            }
            (false, Some(index), false) => {
                self.api
                    .edit_article(&edit(
                        EditTarget::Section(index),
                        EditMode::Append,
                        format!("{APPEND_SEPARATOR}{body}"),
                    ))
                    .await?;
                WriteAction::AppendedSection
            }
            (false, Some(index), true) => {
                self.api
                    .edit_article(&edit(
                        EditTarget::Section(index.clone()),
                        EditMode::Replace,
                        String::new(),
                    ))
                    .await?;
                let recreate = self
                    .api
                    .edit_article(&edit(
                        EditTarget::NewSection(section.to_string()),
                        EditMode::Replace,
                        body.to_string(),
                    ))
                    .await;
                if let Err(e) = recreate {
                    warn!(title = %title, section = %section, index = %index, error = %e,
                        "Section was blanked but could not be recreated");
                    return Err(e);
                }
                WriteAction::RecreatedSection
            }
        };
        Ok(action)
    }
}

impl<A: WikiApi> TranscriptSyntax for MediaWikiBridge<A> {
    fn file_embed(&self, filename: &str) -> String {
        format!("[[File:{filename}]]")
    }

    fn preformatted(&self, name: &str, contents: &str) -> String {
        format!("{name}:\n<pre>{contents}</pre>")
    }
}

#[async_trait]
impl<A: WikiApi> WikiBridge for MediaWikiBridge<A> {
    async fn upload_article(
        &self,
        title: &str,
        section: &str,
        body: &str,
        clobber: bool,
    ) -> BridgeResult<ArticleReceipt> {
        let action = self
            .reconcile(title, section, body, clobber)
            .await
            .map_err(WikiError::into_bridge_error)?;

        let article = self
            .api
            .query_article(title)
            .await
            .map_err(WikiError::into_bridge_error)?;
        info!(title = %title, section = %section, ?action, url = %article.canonical_url, "Article written");

        Ok(ArticleReceipt {
            url: article.canonical_url,
            action,
        })
    }

    async fn upload_image(&self, path: &Path) -> BridgeResult<String> {
        let uploaded = self
            .api
            .upload_file(path)
            .await
            .map_err(WikiError::into_bridge_error)?;
        if uploaded.was_duplicate {
            info!(file = %uploaded.name, "Reusing existing upload");
        }
        Ok(uploaded.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ArticleInfo, UploadedFile};
    use grab_core::BridgeError;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        QueryArticle,
        QuerySection,
        Edit(Edit),
        Upload(String),
    }

    /// Destination state plus a log of every call made against it.
    #[derive(Default)]
    struct FakeWiki {
        exists: bool,
        sections: Vec<(String, String)>,
        fail_new_section: bool,
        auth_broken: bool,
        uploads: Mutex<HashMap<Vec<u8>, String>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeWiki {
        fn missing() -> Self {
            Self::default()
        }

        fn existing(sections: &[(&str, &str)]) -> Self {
            Self {
                exists: true,
                sections: sections
                    .iter()
                    .map(|(line, index)| (line.to_string(), index.to_string()))
                    .collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn edits(&self) -> Vec<Edit> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Edit(edit) => Some(edit),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl WikiApi for FakeWiki {
        async fn query_article(&self, title: &str) -> WikiResult<ArticleInfo> {
            self.calls.lock().unwrap().push(Call::QueryArticle);
            if self.auth_broken {
                return Err(WikiError::Auth("WrongPass".into()));
            }
            Ok(ArticleInfo {
                exists: self.exists,
                canonical_url: format!("https://wiki.example.org/wiki/{}", title.replace(' ', "_")),
            })
        }

        async fn query_section(&self, _title: &str, section: &str) -> WikiResult<Option<String>> {
            self.calls.lock().unwrap().push(Call::QuerySection);
            Ok(self
                .sections
                .iter()
                .find(|(line, _)| line == section)
                .map(|(_, index)| index.clone()))
        }

        async fn edit_article(&self, edit: &Edit) -> WikiResult<()> {
            self.calls.lock().unwrap().push(Call::Edit(edit.clone()));
            if self.fail_new_section && matches!(edit.target, EditTarget::NewSection(_)) {
                return Err(WikiError::api("editconflict", "Edit conflict"));
            }
            Ok(())
        }

        async fn upload_file(&self, path: &Path) -> WikiResult<UploadedFile> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.calls.lock().unwrap().push(Call::Upload(name.clone()));
            let contents = std::fs::read(path)?;
            let mut uploads = self.uploads.lock().unwrap();
            match uploads.get(&contents) {
                Some(existing) => Ok(UploadedFile {
                    name: existing.clone(),
                    was_duplicate: true,
                }),
                None => {
                    uploads.insert(contents, name.clone());
                    Ok(UploadedFile {
                        name,
                        was_duplicate: false,
                    })
                }
            }
        }
    }

    fn edit(target: EditTarget, mode: EditMode, text: &str) -> Edit {
        Edit {
            title: "Launch".into(),
            target,
            mode,
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_whole_article_created_when_missing() {
        let bridge = MediaWikiBridge::new(FakeWiki::missing());
        let receipt = bridge.upload_article("Launch", "", "body", false).await.unwrap();

        assert_eq!(receipt.action, WriteAction::CreatedArticle);
        assert_eq!(receipt.url, "https://wiki.example.org/wiki/Launch");
        assert_eq!(
            bridge.api().calls(),
            vec![
                Call::QueryArticle,
                Call::Edit(edit(EditTarget::Article, EditMode::Replace, "body")),
                Call::QueryArticle,
            ]
        );
    }

    #[tokio::test]
    async fn test_whole_article_appended() {
        let bridge = MediaWikiBridge::new(FakeWiki::existing(&[]));
        let receipt = bridge.upload_article("Launch", "", "body", false).await.unwrap();

        assert_eq!(receipt.action, WriteAction::AppendedArticle);
        assert_eq!(
            bridge.api().edits(),
            vec![edit(EditTarget::Article, EditMode::Append, "\n\nbody")]
        );
    }

    #[tokio::test]
    async fn test_whole_article_replaced() {
        let bridge = MediaWikiBridge::new(FakeWiki::existing(&[("Notes", "1")]));
        let receipt = bridge.upload_article("Launch", "", "body", true).await.unwrap();

        assert_eq!(receipt.action, WriteAction::ReplacedArticle);
        assert_eq!(
            bridge.api().edits(),
            vec![edit(EditTarget::Article, EditMode::Replace, "body")]
        );
        assert!(!bridge.api().calls().contains(&Call::QuerySection));
    }

    #[tokio::test]
    async fn test_missing_section_created() {
        let bridge = MediaWikiBridge::new(FakeWiki::existing(&[("Intro", "1")]));
        let receipt = bridge
            .upload_article("Launch", "Notes", "body", false)
            .await
            .unwrap();

        assert_eq!(receipt.action, WriteAction::CreatedSection);
        assert_eq!(
            bridge.api().edits(),
            vec![edit(
                EditTarget::NewSection("Notes".into()),
                EditMode::Replace,
                "body"
            )]
        );
    }

    #[tokio::test]
    async fn test_section_on_missing_article_skips_lookup() {
        let bridge = MediaWikiBridge::new(FakeWiki::missing());
        let receipt = bridge
            .upload_article("Launch", "Notes", "body", true)
            .await
            .unwrap();

        assert_eq!(receipt.action, WriteAction::CreatedSection);
        assert!(!bridge.api().calls().contains(&Call::QuerySection));
    }

    #[tokio::test]
    async fn test_existing_section_appended() {
        let bridge = MediaWikiBridge::new(FakeWiki::existing(&[("Intro", "1"), ("Notes", "2")]));
        let receipt = bridge
            .upload_article("Launch", "Notes", "body", false)
            .await
            .unwrap();

        assert_eq!(receipt.action, WriteAction::AppendedSection);
        assert_eq!(
            bridge.api().edits(),
            vec![edit(
                EditTarget::Section("2".into()),
                EditMode::Append,
                "\n\nbody"
            )]
        );
    }

    #[tokio::test]
    async fn test_existing_section_clobbered_blanks_then_recreates() {
        let bridge = MediaWikiBridge::new(FakeWiki::existing(&[("Notes", "3")]));
        let receipt = bridge
            .upload_article("Launch", "Notes", "body", true)
            .await
            .unwrap();

        assert_eq!(receipt.action, WriteAction::RecreatedSection);
        assert_eq!(
            bridge.api().calls(),
            vec![
                Call::QueryArticle,
                Call::QuerySection,
                Call::Edit(edit(EditTarget::Section("3".into()), EditMode::Replace, "")),
                Call::Edit(edit(
                    EditTarget::NewSection("Notes".into()),
                    EditMode::Replace,
                    "body"
                )),
                Call::QueryArticle,
            ]
        );
    }

    #[tokio::test]
    async fn test_section_match_is_case_sensitive() {
        let bridge = MediaWikiBridge::new(FakeWiki::existing(&[("notes", "1")]));
        let receipt = bridge
            .upload_article("Launch", "Notes", "body", false)
            .await
            .unwrap();
        assert_eq!(receipt.action, WriteAction::CreatedSection);
    }

    #[tokio::test]
    async fn test_failed_recreate_is_not_rolled_back() {
        let wiki = FakeWiki {
            fail_new_section: true,
            ..FakeWiki::existing(&[("Notes", "1")])
        };
        let bridge = MediaWikiBridge::new(wiki);
        let err = bridge
            .upload_article("Launch", "Notes", "body", true)
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::DestinationWrite(_)));
        assert_eq!(bridge.api().edits().len(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_before_writing() {
        let wiki = FakeWiki {
            auth_broken: true,
            ..FakeWiki::existing(&[])
        };
        let bridge = MediaWikiBridge::new(wiki);
        let err = bridge.upload_article("Launch", "", "body", false).await.unwrap_err();

        assert!(matches!(err, BridgeError::DestinationAuth(_)));
        assert!(bridge.api().edits().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_upload_returns_existing_name() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("grab-first.png");
        let second = dir.path().join("grab-second.png");
        std::fs::write(&first, b"same pixels").unwrap();
        std::fs::write(&second, b"same pixels").unwrap();

        let bridge = MediaWikiBridge::new(FakeWiki::missing());
        assert_eq!(bridge.upload_image(&first).await.unwrap(), "grab-first.png");
        assert_eq!(bridge.upload_image(&first).await.unwrap(), "grab-first.png");
        assert_eq!(bridge.upload_image(&second).await.unwrap(), "grab-first.png");
        assert_eq!(bridge.api().uploads.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_transcript_syntax() {
        let bridge = MediaWikiBridge::new(FakeWiki::missing());
        assert_eq!(bridge.file_embed("Diagram.png"), "[[File:Diagram.png]]");
        assert_eq!(
            bridge.preformatted("notes.txt", "a\nb"),
            "notes.txt:\n<pre>a\nb</pre>"
        );
    }
}
