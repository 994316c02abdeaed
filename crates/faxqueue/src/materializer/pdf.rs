//! Single-page A4 PDF rendering for raster sources.

use image::{ColorType, GenericImageView, ImageFormat};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::ConversionError;

pub const PAGE_WIDTH_PT: f64 = 595.28;
pub const PAGE_HEIGHT_PT: f64 = 841.89;
pub const PAGE_MARGIN_PT: f64 = 6.0;

/// Where the image lands on the page, in points from the lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Images relatively taller than the printable area are fit to its height,
/// all others to its width. The result is centered on the page.
pub fn fit_to_page(image_width: u32, image_height: u32) -> Placement {
    let available_width = PAGE_WIDTH_PT - 2.0 * PAGE_MARGIN_PT;
    let available_height = PAGE_HEIGHT_PT - 2.0 * PAGE_MARGIN_PT;

    let image_width = f64::from(image_width.max(1));
    let image_height = f64::from(image_height.max(1));

    let (width, height) = if image_height / image_width > available_height / available_width {
        (available_height * image_width / image_height, available_height)
    } else {
        (available_width, available_width * image_height / image_width)
    };

    Placement {
        x: (PAGE_WIDTH_PT - width) / 2.0,
        y: (PAGE_HEIGHT_PT - height) / 2.0,
        width,
        height,
    }
}

pub fn image_to_pdf(image_data: &[u8], format: ImageFormat) -> Result<Vec<u8>, ConversionError> {
    let _span = tracing::debug_span!("materialize.pdf").entered();

    let img = image::load_from_memory_with_format(image_data, format)
        .map_err(|e| ConversionError::MalformedImage(e.to_string()))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ConversionError::MalformedImage(
            "image has no pixels".to_string(),
        ));
    }

    // Baseline RGB JPEGs can be embedded without re-encoding.
    let image_stream = if format == ImageFormat::Jpeg && img.color() == ColorType::Rgb8 {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image_data.to_vec(),
        )
    } else {
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            img.to_rgb8().into_raw(),
        );
        // Raw pixels are large; a failed compression just leaves them as-is.
        let _ = stream.compress();
        stream
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(image_stream);
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im1" => image_id,
        },
    });

    let placement = fit_to_page(width, height);
    let content = format!(
        "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/Im1 Do\nQ\n",
        placement.width, placement.height, placement.x, placement.y
    );
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            Object::Real(PAGE_WIDTH_PT as f32),
            Object::Real(PAGE_HEIGHT_PT as f32),
        ],
        "Resources" => resources_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConversionError::PdfWrite(e.to_string()))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(img: image::DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_tall_image_fits_height() {
        let p = fit_to_page(100, 400);
        assert!(approx(p.height, PAGE_HEIGHT_PT - 2.0 * PAGE_MARGIN_PT));
        assert!(approx(p.width, p.height / 4.0));
        assert!(approx(p.y, PAGE_MARGIN_PT));
        assert!(approx(p.x * 2.0 + p.width, PAGE_WIDTH_PT));
    }

    #[test]
    fn test_wide_image_fits_width() {
        let p = fit_to_page(800, 200);
        assert!(approx(p.width, PAGE_WIDTH_PT - 2.0 * PAGE_MARGIN_PT));
        assert!(approx(p.height, p.width / 4.0));
        assert!(approx(p.x, PAGE_MARGIN_PT));
        assert!(approx(p.y * 2.0 + p.height, PAGE_HEIGHT_PT));
    }

    #[test]
    fn test_square_image_fits_width_on_portrait_page() {
        let p = fit_to_page(50, 50);
        assert!(approx(p.width, p.height));
        assert!(approx(p.x, PAGE_MARGIN_PT));
    }

    #[test]
    fn test_png_becomes_one_page_pdf() {
        let png = encode(
            image::DynamicImage::ImageRgba8(image::RgbaImage::new(40, 30)),
            ImageFormat::Png,
        );
        let pdf = image_to_pdf(&png, ImageFormat::Png).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_jpeg_passthrough() {
        let jpeg = encode(
            image::DynamicImage::ImageRgb8(image::RgbImage::new(16, 16)),
            ImageFormat::Jpeg,
        );
        let pdf = image_to_pdf(&jpeg, ImageFormat::Jpeg).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_malformed_image() {
        let result = image_to_pdf(b"\x89PNG\r\n\x1a\nbroken", ImageFormat::Png);
        assert!(matches!(result, Err(ConversionError::MalformedImage(_))));
    }
}
