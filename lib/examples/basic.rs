/// Basic example: dither a generated test image with every pattern
///
/// Writes one PNG per pattern next to the input so they can be compared
use dither_rendr::{DitherPattern, DitherSettings, process_frame};
use image::{Rgba, RgbaImage};

fn main() {
    println!("Dither Renderer - Basic Example");
    println!("===============================\n");

    // Horizontal gray ramp with a colour disc in the middle
    let width = 256;
    let height = 160;
    let mut img = RgbaImage::from_fn(width, height, |x, _| {
        let v = (x * 255 / (width - 1)) as u8;
        Rgba([v, v, v, 255])
    });

    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let radius = 50.0;
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - center_x;
            let dy = y as f32 - center_y;
            if (dx * dx + dy * dy).sqrt() < radius {
                img.put_pixel(x, y, Rgba([220, 90, 40, 255]));
            }
        }
    }

    println!("Created test image: {}x{}", width, height);
    img.save("basic_input.png").expect("Failed to save input");

    for pattern in DitherPattern::ALL {
        let settings = DitherSettings {
            pattern,
            pixelation: 2.0,
            ..Default::default()
        };
        let output = process_frame(&img, &settings);

        let path = format!("basic_{}.png", pattern.id());
        output.image.save(&path).expect("Failed to save output");
        println!("✓ {:<20} -> {}", pattern.label(), path);
    }

    println!("\nDithering complete!");
}
