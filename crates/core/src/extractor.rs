use crate::config::{HttpConfig, DEFAULT_MAX_DOCUMENT_BYTES};
use crate::error::ExtractError;
use crate::sanitize::sanitize_text;
use crate::traits::DocumentSource;
use crate::{ArticleExcerpt, ConfigError};
use async_trait::async_trait;
use lopdf::Document;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

pub const ARTICLE_ONE_MARKERS: [&str; 3] = ["Art. 1", "Art. 1º", "Artigo 1"];
/// The marker line plus the nine that follow it.
pub const EXCERPT_LINES: usize = 10;

pub trait PdfExtractor {
    fn first_page_text(&self, pdf: &[u8]) -> Result<String, ExtractError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn first_page_text(&self, pdf: &[u8]) -> Result<String, ExtractError> {
        let document = Document::load_mem(pdf)?;
        let first_page = document
            .get_pages()
            .keys()
            .next()
            .copied()
            .ok_or(ExtractError::NoPages)?;

        Ok(document.extract_text(&[first_page])?)
    }
}

/// Scans rendered page text for the first line carrying an article-one
/// marker and returns it joined with the following lines.
pub fn locate_article_one(page_text: &str) -> ArticleExcerpt {
    let lines = page_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    let start = lines.iter().position(|line| {
        ARTICLE_ONE_MARKERS
            .iter()
            .any(|marker| line.contains(marker))
    });

    match start {
        Some(index) => {
            let end = (index + EXCERPT_LINES).min(lines.len());
            ArticleExcerpt::Found(sanitize_text(&lines[index..end].join(" ")))
        }
        None => ArticleExcerpt::NotLocated,
    }
}

/// Downloads the full-text PDF and extracts the article-one excerpt from its
/// first page.
pub struct HttpDocumentExtractor<E = LopdfExtractor> {
    client: Client,
    pdf: Arc<E>,
    max_bytes: u64,
}

impl HttpDocumentExtractor<LopdfExtractor> {
    pub fn new(http: &HttpConfig) -> Result<Self, ConfigError> {
        Ok(
            Self::with_extractor(http.client(http.request_timeout)?, LopdfExtractor)
                .with_max_bytes(http.max_document_bytes),
        )
    }
}

impl<E> HttpDocumentExtractor<E>
where
    E: PdfExtractor + Send + Sync + 'static,
{
    pub fn with_extractor(client: Client, extractor: E) -> Self {
        Self {
            client,
            pdf: Arc::new(extractor),
            max_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ExtractError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status {
                url: url.to_string(),
                status,
            });
        }

        let too_large = || ExtractError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn try_excerpt(&self, url: &str) -> Result<ArticleExcerpt, ExtractError> {
        let bytes = self.download(url).await?;
        debug!(url, size = bytes.len(), "document downloaded");

        let extractor = Arc::clone(&self.pdf);
        let text =
            tokio::task::spawn_blocking(move || extractor.first_page_text(&bytes)).await??;

        Ok(locate_article_one(&text))
    }
}

#[async_trait]
impl<E> DocumentSource for HttpDocumentExtractor<E>
where
    E: PdfExtractor + Send + Sync + 'static,
{
    async fn excerpt(&self, url: &str) -> ArticleExcerpt {
        match self.try_excerpt(url).await {
            Ok(excerpt) => {
                if !excerpt.is_found() {
                    debug!(url, "article one marker not found on first page");
                }
                excerpt
            }
            Err(error) => {
                warn!(url, error = %error, "document extraction failed");
                ArticleExcerpt::DownloadFailed
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Single-page PDF with one text block per line.
    pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut operations = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
            operations.push(Operation::new(
                "Td",
                vec![50.into(), (780 - 14 * index as i64).into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let encoded = content.encode().expect("content should encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("pdf should serialize");
        buffer
    }
}
