//! pdfrecipe CLI - sign, extract and rewrite PDF documents

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfrecipe::{
    extract_annotation_images, extract_page_images, extract_resource_images, make_text_black,
    trim_and_center_page, trim_page, FontHeightMode, ImageWriter, ImageXObject, PageSelection,
    PdfDocument, Pkcs12Signer, Rectangle, Region, TextOptions, TextStripper, TextStripperByArea,
    VisibleSignDesigner, VisibleSignature,
};

#[derive(Parser)]
#[command(name = "pdfrecipe")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Sign, extract and rewrite PDF documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a PDF with a visible signature, writing <input>_signed.pdf
    Sign {
        /// PKCS#12 keystore file
        #[arg(value_name = "KEYSTORE")]
        keystore: PathBuf,

        /// Keystore password
        #[arg(value_name = "PIN", env = "PDFRECIPE_PIN")]
        pin: String,

        /// Input PDF file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Signature image (PNG or JPEG)
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Timestamp the signature using the given TSA server
        #[arg(long, value_name = "URL")]
        tsa: Option<String>,

        /// Sign using the external signature creation scenario
        #[arg(short = 'e', long = "external")]
        external: bool,

        /// Write the signature into the saved file after the fact
        #[arg(long, requires = "external")]
        late: bool,
    },

    /// Extract text
    Text {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Order text by position instead of content stream order
        #[arg(long)]
        sort: bool,

        /// Glyph height used to group lines
        #[arg(long, value_enum, default_value = "descriptor")]
        height: HeightMode,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Print glyph positions as JSON
        #[arg(long)]
        positions: bool,

        /// Skip pages whose content cannot be processed
        #[arg(long)]
        lenient: bool,
    },

    /// Extract the text inside a rectangle (top-left origin)
    Region {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(value_name = "X")]
        x: f32,

        #[arg(value_name = "Y")]
        y: f32,

        #[arg(value_name = "WIDTH")]
        width: f32,

        #[arg(value_name = "HEIGHT")]
        height: f32,
    },

    /// Extract images
    Images {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// File name prefix (defaults to the input file stem)
        #[arg(long)]
        prefix: Option<String>,

        /// Which images to extract
        #[arg(long, value_enum, default_value = "drawn")]
        source: ImageSource,
    },

    /// Print the XFA form data
    Xfa {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Draw all text in black
    BlackText {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Hide everything outside a rectangle (PDF user space)
    Trim {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(value_name = "X")]
        x: f32,

        #[arg(value_name = "Y")]
        y: f32,

        #[arg(value_name = "WIDTH")]
        width: f32,

        #[arg(value_name = "HEIGHT")]
        height: f32,

        /// Also move the page boxes so the kept area is centred
        #[arg(long)]
        center: bool,
    },

    /// Draw an image centred on a page
    AddImage {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: u32,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum HeightMode {
    /// Font descriptor bounding box
    Descriptor,
    /// Font size only
    FontSize,
}

impl From<HeightMode> for FontHeightMode {
    fn from(mode: HeightMode) -> Self {
        match mode {
            HeightMode::Descriptor => FontHeightMode::Descriptor,
            HeightMode::FontSize => FontHeightMode::FontSize,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ImageSource {
    /// Images drawn by the page content
    Drawn,
    /// Images listed in the page resources
    Resources,
    /// Images drawn by annotation appearances
    Annotations,
}

/// Accept the single-dash `-tsa` spelling of `--tsa`.
fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    args.into_iter()
        .map(|arg| if arg == "-tsa" { "--tsa".to_string() } else { arg })
        .collect()
}

fn main() {
    env_logger::init();

    let cli = Cli::parse_from(normalize_args(std::env::args()));

    let result = match cli.command {
        Commands::Sign {
            keystore,
            pin,
            input,
            image,
            tsa,
            external,
            late,
        } => cmd_sign(&keystore, &pin, &input, &image, tsa.as_deref(), external, late),
        Commands::Text {
            input,
            output,
            sort,
            height,
            pages,
            positions,
            lenient,
        } => cmd_text(
            &input,
            output.as_deref(),
            sort,
            height,
            pages.as_deref(),
            positions,
            lenient,
        ),
        Commands::Region {
            input,
            page,
            x,
            y,
            width,
            height,
        } => cmd_region(&input, page, Region::new(x, y, width, height)),
        Commands::Images {
            input,
            output,
            prefix,
            source,
        } => cmd_images(&input, output.as_deref(), prefix.as_deref(), source),
        Commands::Xfa { input, output } => cmd_xfa(&input, output.as_deref()),
        Commands::BlackText { input, output } => cmd_black_text(&input, &output),
        Commands::Trim {
            input,
            output,
            page,
            x,
            y,
            width,
            height,
            center,
        } => cmd_trim(&input, &output, page, Rectangle::new(x, y, width, height), center),
        Commands::AddImage {
            input,
            image,
            output,
            page,
        } => cmd_add_image(&input, &image, &output, page),
        Commands::Info { input } => cmd_info(&input),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// `<dir>/<stem>_signed.pdf` next to the input.
fn signed_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{}_signed.pdf", stem))
}

fn cmd_sign(
    keystore: &Path,
    pin: &str,
    input: &Path,
    image: &Path,
    tsa: Option<&str>,
    external: bool,
    late: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("Loading keystore...");
    let signer = Pkcs12Signer::from_file(keystore, pin)?;
    log::info!("Loaded keystore {}", keystore.display());
    pb.inc(1);

    pb.set_message("Designing appearance...");
    let page = 1;
    let designer = {
        let doc = PdfDocument::open(input)?;
        VisibleSignDesigner::from_file(&doc, image, page)?
            .x_axis(0.0)
            .y_axis(0.0)
            .zoom(-50.0)
            .adjust_for_rotation()
    };
    pb.inc(1);

    pb.set_message("Signing...");
    let output = signed_path(input);
    let mut signing = VisibleSignature::new(signer);
    signing.set_visible_sign_designer(designer);
    signing.set_visible_signature_properties("name", "location", "Security", 0, page, true);
    signing.set_external_signing(external);
    signing.set_late_external_signing(late);
    if let Some(url) = tsa {
        log::info!("Requesting timestamp from {}", url);
    }
    log::debug!("Signing {} (external: {}, late: {})", input.display(), external, late);
    signing.sign_pdf(input, &output, tsa, None)?;
    pb.inc(1);

    pb.finish_with_message("Done!");
    println!("{} {}", "Saved to".green(), output.display());
    Ok(())
}

fn cmd_text(
    input: &Path,
    output: Option<&Path>,
    sort: bool,
    height: HeightMode,
    pages: Option<&str>,
    positions: bool,
    lenient: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let page_selection = if let Some(p) = pages {
        PageSelection::parse(p)?
    } else {
        PageSelection::All
    };

    let mut options = TextOptions::new()
        .with_sort_by_position(sort)
        .with_font_height(height.into())
        .with_pages(page_selection.clone());
    if lenient {
        options = options.lenient();
    }
    let stripper = TextStripper::new(options);
    let doc = PdfDocument::open(input)?;

    let text = if positions {
        let mut all = Vec::new();
        for (number, page_id) in doc.page_ids() {
            if page_selection.includes(number) {
                all.extend(stripper.text_positions(doc.inner(), page_id)?);
            }
        }
        serde_json::to_string_pretty(&all)?
    } else {
        stripper.get_text(doc.inner())?
    };

    if let Some(path) = output {
        fs::write(path, &text)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", text);
    }

    Ok(())
}

fn cmd_region(input: &Path, page: u32, region: Region) -> Result<(), Box<dyn std::error::Error>> {
    let doc = PdfDocument::open(input)?;
    let page_id = doc.page_id(page)?;

    let mut stripper = TextStripperByArea::new(TextOptions::new().sorted());
    stripper.add_region("region", region);
    stripper.extract_regions(doc.inner(), page_id)?;

    print!("{}", stripper.text_for_region("region"));
    Ok(())
}

fn cmd_images(
    input: &Path,
    output: Option<&Path>,
    prefix: Option<&str>,
    source: ImageSource,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = PdfDocument::open(input)?;
    let output_dir = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let prefix = prefix.map(str::to_string).unwrap_or_else(|| stem.to_string());
    let writer = ImageWriter::new(&output_dir);

    let named: Vec<(String, pdfrecipe::ExtractedImage)> = match source {
        ImageSource::Drawn => extract_page_images(doc.inner())?
            .into_iter()
            .map(|i| (i.file_name(&prefix), i.image))
            .collect(),
        ImageSource::Resources => extract_resource_images(doc.inner())?
            .into_iter()
            .map(|i| (i.file_name(&prefix), i.image))
            .collect(),
        ImageSource::Annotations => extract_annotation_images(doc.inner())?
            .into_iter()
            .map(|i| (i.file_name(&prefix), i.image))
            .collect(),
    };

    for (name, image) in &named {
        let path = writer.write(image, name)?;
        log::debug!(
            "Wrote {} ({:?}, {}x{})",
            path.display(),
            image.format,
            image.width,
            image.height
        );
        println!("{} {}", "Extracted".green(), name);
    }

    println!("\n{} {} images extracted", "Done!".green().bold(), named.len());
    Ok(())
}

fn cmd_xfa(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(xfa) = pdfrecipe::read_xfa(input)? else {
        println!("{}", "No XFA form".yellow());
        return Ok(());
    };

    if let Some(path) = output {
        fs::write(path, &xfa)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", String::from_utf8_lossy(&xfa));
    }
    Ok(())
}

fn cmd_black_text(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = PdfDocument::open(input)?;
    make_text_black(doc.inner_mut())?;
    doc.save(output)?;
    println!("{} {}", "Saved to".green(), output.display());
    Ok(())
}

fn cmd_trim(
    input: &Path,
    output: &Path,
    page: u32,
    keep: Rectangle,
    center: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = PdfDocument::open(input)?;
    let page_id = doc.page_id(page)?;
    if center {
        trim_and_center_page(doc.inner_mut(), page_id, &keep)?;
    } else {
        trim_page(doc.inner_mut(), page_id, &keep)?;
    }
    doc.save(output)?;
    println!("{} {}", "Saved to".green(), output.display());
    Ok(())
}

fn cmd_add_image(
    input: &Path,
    image: &Path,
    output: &Path,
    page: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = PdfDocument::open(input)?;
    let page_id = doc.page_id(page)?;
    let xobject = ImageXObject::from_file(doc.inner_mut(), image)?;
    pdfrecipe::add_centered_image(doc.inner_mut(), page_id, &xobject)?;
    doc.save(output)?;
    println!("{} {}", "Saved to".green(), output.display());
    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let doc = PdfDocument::open(input)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), doc.version_string());
    println!("{}: {}", "Pages".bold(), doc.page_count());
    println!(
        "{}: {}",
        "Encrypted".bold(),
        if doc.is_encrypted() { "Yes" } else { "No" }
    );
    for key in ["Title", "Author", "Producer"] {
        if let Some(value) = doc.info_string(key.as_bytes()) {
            println!("{}: {}", key.bold(), value);
        }
    }

    println!();
    println!("{}", "Forms".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let fields = pdfrecipe::form::fields(doc.inner());
    let signatures = fields.iter().filter(|f| f.is_signature()).count();
    println!("{}: {}", "Fields".bold(), fields.len());
    println!("{}: {}", "Signature fields".bold(), signatures);
    println!(
        "{}: {}",
        "DocMDP permission".bold(),
        pdfrecipe::sign::get_mdp_permission(doc.inner())
    );
    println!(
        "{}: {}",
        "XFA".bold(),
        if pdfrecipe::get_xfa(doc.inner())?.is_some() { "Yes" } else { "No" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_dash_tsa() {
        let args = [
            "pdfrecipe", "sign", "ks.p12", "123456", "in.pdf", "sig.png", "-tsa", "http://tsa",
            "-e",
        ]
        .iter()
        .map(|s| s.to_string());
        let cli = Cli::parse_from(normalize_args(args));
        match cli.command {
            Commands::Sign { tsa, external, late, pin, .. } => {
                assert_eq!(tsa.as_deref(), Some("http://tsa"));
                assert!(external);
                assert!(!late);
                assert_eq!(pin, "123456");
            }
            _ => panic!("expected sign"),
        }
    }

    #[test]
    fn test_signed_path() {
        assert_eq!(
            signed_path(Path::new("/tmp/report.v2.pdf")),
            PathBuf::from("/tmp/report.v2_signed.pdf")
        );
        assert_eq!(signed_path(Path::new("doc.pdf")), PathBuf::from("doc_signed.pdf"));
    }
}
