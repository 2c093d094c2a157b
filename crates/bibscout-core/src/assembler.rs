//! Record assembly: fetch a candidate's exportable bibliographic text and
//! append derived fields before its closing delimiter.

use crate::fetch::Fetcher;
use crate::parse;
use crate::{Candidate, ResolveError, ResolvedRecord};

/// Resolution context appended to the exported record.
///
/// Caller-supplied provenance (checksum, timestamp, inode) plus the
/// fragment-derived fields the orchestrator fills in.
#[derive(Debug, Clone, Default)]
pub struct AssemblyContext {
    pub file_ref: Option<String>,
    pub checksum: Option<String>,
    pub doi: Option<String>,
    pub abstract_text: Option<String>,
    pub timestamp: String,
    pub file_inode: Option<u64>,
    pub queries_issued: usize,
}

/// Fetch the candidate's export text and append the derived fields.
///
/// Field-level absence skips that one field; only a missing or unfetchable
/// export link fails assembly as a whole.
pub async fn assemble_record(
    candidate: &Candidate,
    ctx: &AssemblyContext,
    fetcher: &dyn Fetcher,
) -> Result<ResolvedRecord, ResolveError> {
    let export_url = candidate
        .export_url
        .as_deref()
        .ok_or(ResolveError::MissingExportLink)?;

    let mut text = fetcher.fetch(export_url).await?;

    // The export endpoint serves challenges too; a captcha page must never
    // pass as record text.
    if parse::is_challenge(&text) {
        return Err(ResolveError::ChallengeDetected {
            url: export_url.to_string(),
        });
    }

    // Escaped-quote artifact in some exported records.
    text = text.replace("{\\\\\"", "{\\\"");

    if let Some(ref file_ref) = ctx.file_ref {
        // JabRef-style file link with a type suffix.
        text = append_field(&text, "file", &format!("file://{file_ref}:pdf"));
    }
    if let Some(ref checksum) = ctx.checksum {
        text = append_field(&text, "checksum", checksum);
    }
    if let Some(ref url) = candidate.url {
        text = append_field(&text, "url", url);
    }
    if let Some(ref cached) = candidate.cached_url {
        text = append_field(&text, "cached", cached);
    }
    if let Some(citations) = candidate.citations {
        text = append_field(&text, "citations", &citations.to_string());
        if let Some(ref id) = candidate.cited_by_id {
            text = append_field(&text, "citedby", id);
        }
    }
    if let Some(ref doi) = ctx.doi {
        text = append_field(&text, "doi", doi);
    }
    if let Some(ref abstract_text) = ctx.abstract_text {
        text = append_field(&text, "abstract", abstract_text);
    }
    text = append_field(&text, "bibscout", &provenance(ctx));

    Ok(ResolvedRecord {
        text,
        candidate: candidate.clone(),
        queries_issued: ctx.queries_issued,
    })
}

fn provenance(ctx: &AssemblyContext) -> String {
    match ctx.file_inode {
        Some(inode) => format!(
            "timestamp: {}; queries: {}; inode: {inode}",
            ctx.timestamp, ctx.queries_issued
        ),
        None => format!("timestamp: {}; queries: {}", ctx.timestamp, ctx.queries_issued),
    }
}

/// Insert `key={value}` immediately before the record's closing delimiter.
///
/// The closing delimiter is the first `}` followed by a newline that is not a
/// field terminator; records whose fields end in `},` leave exactly the final
/// field's brace matching. A record with no recognizable delimiter is
/// returned unchanged.
fn append_field(record: &str, key: &str, value: &str) -> String {
    match record.find("}\n") {
        Some(pos) => format!(
            "{},\n  {key}={{{value}}}\n{}",
            &record[..pos + 1],
            &record[pos + 2..]
        ),
        None => record.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use std::future::Future;
    use std::pin::Pin;

    const EXPORT: &str = "@article{hajek2006causal,\n  title={Causal Decision Theory and the Possibility of Trade},\n  author={H{\\'a}jek, Alan},\n  year={2006}\n}\n";

    struct FixedFetcher(Result<String, FetchError>);

    impl Fetcher for FixedFetcher {
        fn fetch<'a>(
            &'a self,
            _url: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
            let resp = self.0.clone();
            Box::pin(async move { resp })
        }
    }

    fn candidate() -> Candidate {
        Candidate {
            title: "Causal Decision Theory and the Possibility of Trade".into(),
            url: Some("http://example.org/paper.pdf".into()),
            citations: Some(42),
            cited_by_id: Some("12345678".into()),
            export_url: Some("https://scholar.example.com/scholar.bib?q=info:xyz".into()),
            ..Candidate::default()
        }
    }

    fn context() -> AssemblyContext {
        AssemblyContext {
            file_ref: Some("/papers/trade.pdf".into()),
            checksum: Some("abc123".into()),
            doi: Some("10.1086/508964".into()),
            abstract_text: Some("Short abstract.".into()),
            timestamp: "2026-08-23 12:00:00".into(),
            file_inode: Some(424242),
            queries_issued: 2,
        }
    }

    #[test]
    fn append_before_closing_delimiter() {
        let out = append_field(EXPORT, "checksum", "abc123");
        assert!(out.contains("year={2006},\n  checksum={abc123}\n}"));
    }

    #[test]
    fn append_fields_stack_in_order() {
        let out = append_field(&append_field(EXPORT, "a", "1"), "b", "2");
        let a = out.find("a={1}").unwrap();
        let b = out.find("b={2}").unwrap();
        assert!(a < b);
        assert!(out.ends_with("}\n"));
    }

    #[test]
    fn append_without_delimiter_is_noop() {
        assert_eq!(append_field("no closing brace", "k", "v"), "no closing brace");
    }

    #[tokio::test]
    async fn assembles_all_fields() {
        let fetcher = FixedFetcher(Ok(EXPORT.to_string()));
        let record = assemble_record(&candidate(), &context(), &fetcher)
            .await
            .unwrap();
        let text = &record.text;
        assert!(text.contains("file={file:///papers/trade.pdf:pdf}"));
        assert!(text.contains("checksum={abc123}"));
        assert!(text.contains("url={http://example.org/paper.pdf}"));
        assert!(text.contains("citations={42}"));
        assert!(text.contains("citedby={12345678}"));
        assert!(text.contains("doi={10.1086/508964}"));
        assert!(text.contains("abstract={Short abstract.}"));
        assert!(text.contains("bibscout={timestamp: 2026-08-23 12:00:00; queries: 2; inode: 424242}"));
    }

    #[tokio::test]
    async fn missing_fields_are_skipped_not_fatal() {
        let fetcher = FixedFetcher(Ok(EXPORT.to_string()));
        let bare = Candidate {
            title: "T".into(),
            export_url: candidate().export_url,
            ..Candidate::default()
        };
        let ctx = AssemblyContext {
            timestamp: "2026-08-23 12:00:00".into(),
            queries_issued: 1,
            ..AssemblyContext::default()
        };
        let record = assemble_record(&bare, &ctx, &fetcher).await.unwrap();
        assert!(!record.text.contains("checksum="));
        assert!(!record.text.contains("citations="));
        assert!(record.text.contains("bibscout={timestamp: 2026-08-23 12:00:00; queries: 1}"));
    }

    #[tokio::test]
    async fn missing_export_link_fails() {
        let fetcher = FixedFetcher(Ok(EXPORT.to_string()));
        let mut c = candidate();
        c.export_url = None;
        let err = assemble_record(&c, &context(), &fetcher).await.err().unwrap();
        assert!(matches!(err, ResolveError::MissingExportLink));
    }

    #[tokio::test]
    async fn challenge_on_export_is_never_assembled() {
        let fetcher = FixedFetcher(Ok(
            "We're sorry but your request looks automated, please type the characters".into(),
        ));
        let err = assemble_record(&candidate(), &context(), &fetcher)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ResolveError::ChallengeDetected { .. }));
    }

    #[tokio::test]
    async fn export_fetch_failure_fails_assembly() {
        let fetcher = FixedFetcher(Err(FetchError::Status(503)));
        let err = assemble_record(&candidate(), &context(), &fetcher)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ResolveError::Export(_)));
    }
}
