use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs;
use tokio::task::spawn_blocking;

use crate::container::{ContentSelector, Item, Package};
use crate::error::{Error, Result};
use crate::markup::Rewriter;
use crate::markup::rewriter::default_skip_tags;
use crate::path_utils::{
    is_same_file, output_directory, output_file_name, sanitize_filename, validate_path,
};
use crate::transform::{DEFAULT_SEPARATOR_REGEX, Segmenter, WordPolicy, separator_regex};
use crate::types::{
    ConversionReport, DEFAULT_OUTPUT_PREFIX, DEFAULT_SEPARATOR_CHARS, InlineScope,
    KyochoExecutionMode, PackageReport, PackageStats, PrefixPolicy, RewriteStats,
    SeparatorPolicy, XHTML_MEDIA_TYPE,
};

lazy_static! {
    /// Accepted element names: an XML name with an optional namespace prefix.
    static ref TAG_NAME_REGEX: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_.\-]*:)?[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap();
}

/// Observer receiving the fraction of items processed (`0.0..=1.0`).
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync + 'static>;

/// The main Kyocho conversion configuration, built declaratively using the builder pattern.
///
/// This struct holds everything needed to rewrite an EPUB into bionic reading
/// style: where the book is read from and written to, how words are split and
/// emphasized, which elements count as prose, and which items are content.
/// Once configured, it can run the conversion through several entry points:
///
/// - [`convert`](KyochoConfig::convert): Full pipeline from `source_path` to the output file
/// - [`convert_from_package`](KyochoConfig::convert_from_package): From a package already in memory
/// - [`convert_package`](KyochoConfig::convert_package): In-memory transform only, nothing written
/// - [`inspect_source`](KyochoConfig::inspect_source): Classification only, no conversion
///
/// ## Builder Pattern
///
/// Use [`KyochoConfig::builder()`](KyochoConfig::builder) to create a new configuration:
///
/// ```rust,no_run
/// # use kyocho::prelude::*;
/// # use std::path::PathBuf;
/// let config = KyochoConfig::builder()
///     .source_path(PathBuf::from("./books/novel.epub"))
///     .target_path(PathBuf::from("./converted"))
///     .min_word_length(2usize)
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct KyochoConfig {
    // --- Input & Output ---
    /// Path of the EPUB file to convert.
    ///
    /// Required for [`convert`](KyochoConfig::convert) and
    /// [`inspect_source`](KyochoConfig::inspect_source). Its file name is also
    /// the base of the output file name.
    #[builder(default)]
    pub source_path: PathBuf,

    /// Directory receiving the converted file.
    ///
    /// When empty, the output is written next to the source file.
    #[builder(default)]
    pub target_path: PathBuf,

    /// Whether to create the output directory if it does not exist yet.
    #[builder(default = "true")]
    pub create_output_directory: bool,

    /// Prefix prepended to the source file name to name the output.
    ///
    /// Examples:
    /// - `"Bionic_"` → "Bionic_novel.epub"
    /// - `"converted-"` → "converted-novel.epub"
    #[builder(default = "DEFAULT_OUTPUT_PREFIX.to_string()")]
    pub output_prefix: String,

    /// Explicit output file name, replacing the prefixed source name.
    #[builder(default)]
    pub output_file_name: Option<String>,

    /// Whether an existing output file may be replaced.
    #[builder(default = "false")]
    pub overwrite_existing: bool,

    // --- Word Emphasis ---
    /// Words shorter than this many characters are left plain.
    #[builder(default = "4")]
    pub min_word_length: usize,

    /// How many leading characters of an eligible word are bolded.
    #[builder(default = "PrefixPolicy::HalfPlusOne")]
    pub prefix_policy: PrefixPolicy,

    /// Punctuation characters that end a word. Whitespace always does.
    ///
    /// Every character is taken literally.
    #[builder(default = "DEFAULT_SEPARATOR_CHARS.to_string()")]
    pub separator_chars: String,

    /// Whether separators are kept as written or normalized to single spaces.
    #[builder(default = "SeparatorPolicy::Preserve")]
    pub separator_policy: SeparatorPolicy,

    // --- Document Scope ---
    /// Local names of the elements whose text is rewritten.
    #[builder(default = "vec![\"p\".to_string()]")]
    pub eligible_tags: Vec<String>,

    /// Whether only direct text children or all inline descendants are rewritten.
    #[builder(default = "InlineScope::DirectChildren")]
    pub inline_scope: InlineScope,

    /// Elements never entered with [`InlineScope::Descendants`].
    #[builder(default = "default_skip_tags()")]
    pub skip_tags: Vec<String>,

    /// Media types of the items that are rewritten. Everything else is copied as-is.
    #[builder(default = "vec![XHTML_MEDIA_TYPE.to_string()]")]
    pub content_media_types: Vec<String>,

    // --- Emitted Markup ---
    /// Element wrapping the bold prefix of a word.
    #[builder(default = "\"b\".to_string()")]
    pub bold_tag: String,

    /// Element replacing each rewritten text node.
    #[builder(default = "\"span\".to_string()")]
    pub wrapper_tag: String,

    /// Class set on wrapper elements. Marked wrappers are skipped when a
    /// document is converted a second time.
    #[builder(default = "Some(\"bionic\".to_string())")]
    pub wrapper_class: Option<String>,

    // --- Execution ---
    /// Rewrite items on a worker pool. Output order always matches input order.
    #[builder(default = "true")]
    pub parallel_items: bool,

    /// Upper bound for the worker pool size.
    #[builder(default = "num_cpus::get()")]
    pub max_threads: usize,

    /// Optional progress observer, called after each item.
    #[builder(default, setter(custom))]
    pub progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for KyochoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KyochoConfig")
            .field("source_path", &self.source_path)
            .field("target_path", &self.target_path)
            .field("create_output_directory", &self.create_output_directory)
            .field("output_prefix", &self.output_prefix)
            .field("output_file_name", &self.output_file_name)
            .field("overwrite_existing", &self.overwrite_existing)
            .field("min_word_length", &self.min_word_length)
            .field("prefix_policy", &self.prefix_policy)
            .field("separator_chars", &self.separator_chars)
            .field("separator_policy", &self.separator_policy)
            .field("eligible_tags", &self.eligible_tags)
            .field("inline_scope", &self.inline_scope)
            .field("skip_tags", &self.skip_tags)
            .field("content_media_types", &self.content_media_types)
            .field("bold_tag", &self.bold_tag)
            .field("wrapper_tag", &self.wrapper_tag)
            .field("wrapper_class", &self.wrapper_class)
            .field("parallel_items", &self.parallel_items)
            .field("max_threads", &self.max_threads)
            .field(
                "progress_callback",
                if self.progress_callback.is_some() {
                    &"Some(Function)"
                } else {
                    &"None"
                },
            )
            .finish()
    }
}

impl KyochoConfig {
    /// Creates a new builder for configuring `KyochoConfig`.
    pub fn builder() -> KyochoConfigBuilder {
        KyochoConfigBuilder::default()
    }

    /// Performs validation checks on the configuration for a specific execution mode.
    ///
    /// Nothing is read or written. All `convert*` methods call this
    /// automatically; calling it yourself only moves the failure earlier.
    ///
    /// # Arguments
    ///
    /// * `mode` - The intended execution mode:
    ///   - [`KyochoExecutionMode::FromSource`]: `source_path` must be an existing file
    ///   - [`KyochoExecutionMode::FromPackage`]: the output must be nameable
    ///     (`output_file_name` or `source_path`)
    ///
    /// In both modes the output may not be the source itself, and may not
    /// already exist unless `overwrite_existing` is set.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use kyocho::prelude::*;
    /// # use std::path::PathBuf;
    /// # fn main() -> kyocho::error::Result<()> {
    /// let config = KyochoConfig::builder()
    ///     .source_path(PathBuf::from("./novel.epub"))
    ///     .build()?;
    ///
    /// config.preflight_check(KyochoExecutionMode::FromSource)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn preflight_check(&self, mode: KyochoExecutionMode) -> Result<&Self> {
        match mode {
            KyochoExecutionMode::FromSource => self.validate_source()?,
            KyochoExecutionMode::FromPackage => {
                if self.output_file_name.is_none() && self.source_path.as_os_str().is_empty() {
                    return Err(Error::Other(
                        "`output_file_name` or `source_path` must be set for `FromPackage` execution mode."
                            .to_string(),
                    ));
                }
            }
        }

        let output_path = self.output_path()?;
        validate_path(&output_path)?;

        if !self.source_path.as_os_str().is_empty() && is_same_file(&self.source_path, &output_path) {
            return Err(Error::InvalidPath(
                output_path,
                "Output would replace the source package.".to_string(),
            ));
        }
        if output_path.exists() && !self.overwrite_existing {
            return Err(Error::AlreadyExists(output_path));
        }
        let output_dir = output_directory(&self.source_path, &self.target_path);
        if !output_dir.exists() && !self.create_output_directory {
            return Err(Error::NotFound(format!(
                "Target directory does not exist: {:?}",
                output_dir
            )));
        }

        Ok(self)
    }

    /// Validates only the source-related parts of the configuration.
    fn validate_source(&self) -> Result<()> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::Other(
                "`source_path` must be set for `FromSource` execution mode.".to_string(),
            ));
        }

        validate_path(&self.source_path)?;

        if !self.source_path.exists() {
            return Err(Error::NotFound(format!(
                "Source path does not exist: {:?}",
                self.source_path
            )));
        }
        if !self.source_path.is_file() {
            return Err(Error::InvalidPath(
                self.source_path.clone(),
                "Source path is not a file.".to_string(),
            ));
        }
        Ok(())
    }

    /// Final location of the converted package.
    ///
    /// The file name is `output_file_name` when set, otherwise `output_prefix`
    /// followed by the source file name. The directory comes from
    /// [`output_directory`]: `target_path`, or the source's directory when
    /// `target_path` is empty.
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - e.g. `converted/Bionic_novel.epub`
    /// * `Err(Error)` - Neither `output_file_name` nor a source file name is available
    pub fn output_path(&self) -> Result<PathBuf> {
        let file_name = match &self.output_file_name {
            Some(name) => sanitize_filename(name),
            None => output_file_name(&self.source_path, &self.output_prefix)?,
        };
        Ok(output_directory(&self.source_path, &self.target_path).join(file_name))
    }

    /// Builds the document mutator described by these settings.
    ///
    /// Word policy, separator set and policy, eligible and skip tags, inline
    /// scope and the emitted markup all come from the configuration. The
    /// default separator set reuses one shared compiled regex; custom sets are
    /// compiled here.
    ///
    /// # Returns
    ///
    /// * `Ok(Rewriter)` - Ready to use on any number of documents
    /// * `Err(Error::Regex)` - `separator_chars` could not be compiled
    pub fn rewriter(&self) -> Result<Rewriter> {
        let separators = if self.separator_chars == DEFAULT_SEPARATOR_CHARS {
            DEFAULT_SEPARATOR_REGEX.clone()
        } else {
            separator_regex(&self.separator_chars)?
        };

        Ok(Rewriter {
            words: WordPolicy {
                min_length: self.min_word_length,
                prefix: self.prefix_policy,
            },
            segmenter: Segmenter::new(separators, self.separator_policy),
            eligible_tags: self.eligible_tags.clone(),
            skip_tags: self.skip_tags.clone(),
            inline_scope: self.inline_scope,
            bold_tag: self.bold_tag.clone(),
            wrapper_tag: self.wrapper_tag.clone(),
            wrapper_class: self.wrapper_class.clone(),
        })
    }

    /// Builds the content item selector for `content_media_types`.
    ///
    /// Items whose declared media type matches one of the configured types
    /// (parameters and case ignored) are rewritten; every other item,
    /// including members outside the manifest, is copied unchanged.
    pub fn selector(&self) -> ContentSelector {
        ContentSelector::new(&self.content_media_types)
    }

    /// Rewrites one content document's markup.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use kyocho::prelude::*;
    /// # fn main() -> kyocho::error::Result<()> {
    /// let config = KyochoConfig::builder().min_word_length(4usize).build()?;
    /// let out = config.transform_document("<p>reading cat</p>")?;
    /// assert_eq!(out, "<p><span class=\"bionic\"><b>read</b>ing cat</span></p>");
    /// # Ok(())
    /// # }
    /// ```
    pub fn transform_document(&self, source: &str) -> Result<String> {
        let (rewritten, _) = self.rewriter()?.rewrite_str(source)?;
        Ok(rewritten)
    }

    /// Classifies every item of the source package without converting anything.
    ///
    /// # Returns
    ///
    /// * `Ok(PackageReport)` - One [`ItemSummary`](crate::types::ItemSummary) per archive member
    /// * `Err(Error)` - The source is missing or is not a readable EPUB container
    pub async fn inspect_source(&self) -> Result<PackageReport> {
        self.validate_source()?;

        let source = self.source_path.clone();
        let selector = self.selector();
        spawn_blocking(move || Package::open(&source).map(|package| package.report(&selector)))
            .await?
    }

    // --- Core conversion entry points ---

    /// Runs the full conversion from `source_path`.
    ///
    /// 1. **Read**: Opens the EPUB container and its manifest
    /// 2. **Transform**: Rewrites every content document, copying all other items
    /// 3. **Publish**: Writes the new package to a temporary file and renames it
    ///    into place only once it is complete
    ///
    /// # Returns
    ///
    /// * `Ok(ConversionReport)` - Where the output went and what changed
    /// * `Err(Error)` - Validation, container, decode or write failure. No output
    ///   file exists after a failed run.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use kyocho::prelude::*;
    /// # use std::path::PathBuf;
    /// # #[tokio::main]
    /// # async fn main() -> kyocho::error::Result<()> {
    /// let report = KyochoConfig::builder()
    ///     .source_path(PathBuf::from("./novel.epub"))
    ///     .build()?
    ///     .convert()
    ///     .await?;
    ///
    /// println!("Wrote {:?}", report.output_path);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn convert(self) -> Result<ConversionReport> {
        self.preflight_check(KyochoExecutionMode::FromSource)?;
        log::info!("Reading package {:?}", self.source_path);

        let source = self.source_path.clone();
        let package = spawn_blocking(move || Package::open(&source))
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        self.convert_from_package(package).await
    }

    /// Converts a package that is already in memory and publishes it to
    /// [`output_path`](KyochoConfig::output_path).
    pub async fn convert_from_package(self, package: Package) -> Result<ConversionReport> {
        self.preflight_check(KyochoExecutionMode::FromPackage)?;

        let output_path = self.output_path()?;
        let output_dir = output_directory(&self.source_path, &self.target_path);
        if !output_dir.exists() {
            fs::create_dir_all(&output_dir).await?;
        }

        let overwrite = self.overwrite_existing;
        let (package, stats) = spawn_blocking(move || self.convert_package(package))
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        let destination = output_path.clone();
        spawn_blocking(move || package.save(&destination, overwrite))
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        log::info!(
            "Wrote {:?}: {} of {} items rewritten, {} words emphasized",
            output_path,
            stats.transformed_items,
            stats.total_items,
            stats.rewrite.words_emphasized
        );

        Ok(ConversionReport {
            output_path,
            stats,
            converted_at: chrono::Utc::now(),
        })
    }

    /// Rewrites every content item of `package` in memory.
    ///
    /// Items keep their order and identity; only the bytes of content items
    /// change. The first item that fails to decode aborts the whole transform.
    pub fn convert_package(&self, mut package: Package) -> Result<(Package, PackageStats)> {
        let rewriter = self.rewriter()?;
        let selector = self.selector();

        let items = package.take_items();
        let total = items.len();
        let finished = AtomicUsize::new(0);

        let process = |item: Item| -> Result<(Item, Option<RewriteStats>)> {
            let outcome = process_item(item, &rewriter, &selector);
            let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(callback) = &self.progress_callback {
                callback(done as f32 / total as f32);
            }
            outcome
        };

        let processed = if self.parallel_items && total > 1 {
            let threads = self.max_threads.min(num_cpus::get()).max(1);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            pool.install(|| {
                items
                    .into_par_iter()
                    .map(process)
                    .collect::<Result<Vec<_>>>()
            })?
        } else {
            items.into_iter().map(process).collect::<Result<Vec<_>>>()?
        };

        let mut stats = PackageStats {
            total_items: total,
            ..Default::default()
        };
        let mut items = Vec::with_capacity(total);
        for (item, rewrite) in processed {
            match rewrite {
                Some(rewrite) => {
                    stats.transformed_items += 1;
                    stats.rewrite += rewrite;
                }
                None => stats.passthrough_items += 1,
            }
            items.push(item);
        }
        package.set_items(items);

        Ok((package, stats))
    }
}

/// Rewrites `item` when the selector marks it as content, otherwise returns it unchanged.
fn process_item(
    mut item: Item,
    rewriter: &Rewriter,
    selector: &ContentSelector,
) -> Result<(Item, Option<RewriteStats>)> {
    if !selector.is_transformable(&item) {
        if item.media_type().is_none() && looks_like_markup(item.path()) {
            log::warn!(
                "'{}' is not declared in the manifest and is copied unchanged",
                item.path()
            );
        } else {
            log::debug!(
                "Copying '{}' ({})",
                item.path(),
                item.media_type().unwrap_or("no media type")
            );
        }
        return Ok((item, None));
    }

    let source =
        std::str::from_utf8(item.data()).map_err(|e| Error::decode(item.identifier(), e))?;
    let (rewritten, stats) = rewriter
        .rewrite_str(source)
        .map_err(|e| Error::decode(item.identifier(), e))?;

    log::debug!(
        "Rewrote '{}': {} text nodes, {} words",
        item.path(),
        stats.text_nodes_rewritten,
        stats.words_emphasized
    );
    item.set_data(rewritten.into_bytes());
    Ok((item, Some(stats)))
}

fn looks_like_markup(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm")
}

impl KyochoConfigBuilder {
    /// Sets a progress observer, called with the fraction of items processed.
    pub fn progress_callback<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Some(Arc::new(callback)));
        self
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(tags) = &self.eligible_tags {
            if tags.is_empty() {
                return Err("At least one eligible tag is required.".to_string());
            }
            for tag in tags {
                validate_tag_name("eligible tag", tag)?;
            }
        }
        if let Some(tags) = &self.skip_tags {
            for tag in tags {
                validate_tag_name("skip tag", tag)?;
            }
        }
        if let Some(tag) = &self.bold_tag {
            validate_tag_name("bold_tag", tag)?;
        }
        if let Some(tag) = &self.wrapper_tag {
            validate_tag_name("wrapper_tag", tag)?;
        }
        if let Some(Some(class)) = &self.wrapper_class {
            if class.is_empty() || class.contains(char::is_whitespace) {
                return Err(format!("Invalid wrapper_class: '{}'", class));
            }
        }

        if let Some(PrefixPolicy::Ratio(ratio)) = self.prefix_policy {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(format!(
                    "Prefix ratio must be in (0, 1], got {}",
                    ratio
                ));
            }
        }

        if let Some(chars) = &self.separator_chars {
            if separator_regex(chars).is_err() {
                return Err(format!("Invalid separator_chars: {}", chars));
            }
        }

        if let Some(0) = self.max_threads {
            return Err("max_threads must be at least 1.".to_string());
        }

        if let Some(Some(name)) = &self.output_file_name {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(format!("Invalid output_file_name: '{}'", name));
            }
        }

        Ok(())
    }
}

fn validate_tag_name(what: &str, tag: &str) -> std::result::Result<(), String> {
    if TAG_NAME_REGEX.is_match(tag) {
        Ok(())
    } else {
        Err(format!("Invalid {}: '{}'", what, tag))
    }
}
