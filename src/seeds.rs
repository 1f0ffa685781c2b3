//! Built-in question pool. Guarantees a playable quiz even when no pool files
//! are deployed and no AI gateway is configured.

use crate::domain::QuestionRecord;

pub fn default_pool() -> Vec<QuestionRecord> {
  vec![
    QuestionRecord::new(
      "Siapa proklamator kemerdekaan Indonesia?",
      &["Sukarno & Hatta", "Sutan Sjahrir", "Tan Malaka", "Sudirman"],
      0,
    ),
    QuestionRecord::new(
      "Tanggal berapakah Indonesia memproklamasikan kemerdekaan?",
      &["17 Agustus 1945", "10 November 1945", "1 Juni 1945", "28 Oktober 1928"],
      0,
    ),
    QuestionRecord::new(
      "Siapa yang menjahit bendera Merah Putih yang dikibarkan saat proklamasi?",
      &["Fatmawati", "R.A. Kartini", "Cut Nyak Dien", "Dewi Sartika"],
      0,
    ),
    QuestionRecord::new(
      "Dimanakah teks proklamasi resmi dibacakan?",
      &["Di Jalan Pegangsaan Timur 56", "Di Istana Merdeka", "Di Alun-alun Kota", "Di Gedung Sate"],
      0,
    ),
    QuestionRecord::new(
      "Apa nama lagu kebangsaan Indonesia?",
      &["Indonesia Raya", "Bagimu Negeri", "Halo-Halo Bandung", "Tanah Airku"],
      0,
    ),
    QuestionRecord::new(
      "Siapakah Pangeran Diponegoro dalam sejarah Indonesia?",
      &[
        "Pemimpin Perang Jawa melawan Belanda",
        "Presiden pertama Indonesia",
        "Pahlawan Kemerdekaan 1945",
        "Pendiri Budi Utomo",
      ],
      0,
    ),
    QuestionRecord::new(
      "Peristiwa 10 November diperingati sebagai hari apa?",
      &["Hari Pahlawan", "Hari Pendidikan Nasional", "Hari Kebangkitan Nasional", "Hari Proklamasi"],
      0,
    ),
    QuestionRecord::new(
      "Apa tujuan Sumpah Pemuda 1928?",
      &["Persatuan bangsa Indonesia", "Mendirikan negara baru", "Menggulingkan penjajah", "Membentuk tentara"],
      0,
    ),
    QuestionRecord::new(
      "Siapa tokoh yang membakar semangat arek-arek Surabaya pada pertempuran 1945?",
      &["Bung Tomo", "Sukarno", "Hatta", "Sutan Sjahrir"],
      0,
    ),
    QuestionRecord::new(
      "Apa nama konferensi yang menghasilkan pengakuan kedaulatan Indonesia pada 1949?",
      &["Konferensi Meja Bundar", "Perjanjian Linggarjati", "Perjanjian Roem-Royen", "Perjanjian Renville"],
      0,
    ),
    QuestionRecord::new(
      "Cut Nyak Dien terkenal karena apa?",
      &[
        "Perlawanan terhadap penjajah di Aceh",
        "Menciptakan lagu kebangsaan",
        "Mendirikan sekolah wanita",
        "Menjadi presiden",
      ],
      0,
    ),
    QuestionRecord::new(
      "Apa tujuan Budi Utomo saat didirikan?",
      &[
        "Mengangkat pendidikan dan kebudayaan pribumi",
        "Menjadi organisasi militer",
        "Menyerang VOC",
        "Membentuk partai politik",
      ],
      0,
    ),
    QuestionRecord::new(
      "Peran pemuda dalam kebangkitan nasional terlihat pada peristiwa apa?",
      &["Sumpah Pemuda 1928", "Konferensi Meja Bundar", "Perjanjian Renville", "Perjanjian Linggarjati"],
      0,
    ),
    QuestionRecord::new(
      "Siapa yang dikenal sebagai Panglima Besar pertama Tentara Nasional Indonesia?",
      &["Jenderal Sudirman", "Sukarno", "Hatta", "Tan Malaka"],
      0,
    ),
  ]
}

/// Served by `/quiz/fakta` when no AI provider answers.
pub const FALLBACK_FACT: &str =
  "Tahukah kamu? Indonesia memproklamasikan kemerdekaan pada 17 Agustus 1945.";

/// Served by `/quiz/chat` when no AI provider answers.
pub const FALLBACK_CHAT_ANSWER: &str =
  "Maaf, saya sedang tidak bisa menghubungi layanan AI. Coba lagi nanti atau cek sumber sejarah terpercaya.";

pub fn fallback_explanation(correct_choice: Option<&str>) -> String {
  format!(
    "Jawaban yang benar adalah '{}'. Penjelasan: ini sesuai dengan fakta sejarah dan sumber yang umum diketahui terkait topik tersebut.",
    correct_choice.unwrap_or("-")
  )
}
