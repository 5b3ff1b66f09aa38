//! Keyword tables used as the last link of a fallback chain.
//!
//! Each entry maps a canonical value to the aliases that identify it. When
//! several aliases match, the one appearing first in the text wins, ties going
//! to the longer alias ("pink bourbon" over "bourbon").

type Lexicon = &'static [(&'static str, &'static [&'static str])];

pub const ORIGINS: Lexicon = &[
    ("Ethiopia", &["ethiopia", "ethiopian", "yirgacheffe", "에티오피아", "예가체프"]),
    ("Kenya", &["kenya", "kenyan", "케냐"]),
    ("Colombia", &["colombia", "colombian", "콜롬비아"]),
    ("Brazil", &["brazil", "brasil", "브라질"]),
    ("Guatemala", &["guatemala", "과테말라"]),
    ("Costa Rica", &["costa rica", "코스타리카"]),
    ("Panama", &["panama", "파나마"]),
    ("Honduras", &["honduras", "온두라스"]),
    ("El Salvador", &["el salvador", "엘살바도르"]),
    ("Nicaragua", &["nicaragua", "니카라과"]),
    ("Mexico", &["mexico", "멕시코"]),
    ("Peru", &["peru", "페루"]),
    ("Bolivia", &["bolivia", "볼리비아"]),
    ("Ecuador", &["ecuador", "에콰도르"]),
    ("Rwanda", &["rwanda", "르완다"]),
    ("Burundi", &["burundi", "부룬디"]),
    ("Tanzania", &["tanzania", "탄자니아"]),
    ("Uganda", &["uganda", "우간다"]),
    ("Yemen", &["yemen", "예멘"]),
    ("Indonesia", &["indonesia", "sumatra", "sulawesi", "인도네시아", "수마트라"]),
    ("Papua New Guinea", &["papua new guinea", "파푸아뉴기니"]),
    ("India", &["india", "인도"]),
    ("Vietnam", &["vietnam", "베트남"]),
    ("China", &["yunnan", "china", "윈난", "중국"]),
    ("Jamaica", &["jamaica", "blue mountain", "자메이카"]),
    ("Hawaii", &["hawaii", "kona", "하와이", "코나"]),
];

pub const PROCESSES: Lexicon = &[
    ("Carbonic Maceration", &["carbonic maceration", "카보닉"]),
    ("Anaerobic", &["anaerobic", "무산소", "애너로빅"]),
    ("Wet Hulled", &["wet hulled", "wet-hulled", "giling basah"]),
    ("Honey", &["honey process", "honey", "pulped natural", "허니"]),
    ("Natural", &["natural", "dry process", "내추럴", "건식"]),
    ("Washed", &["washed", "fully washed", "wet process", "워시드", "수세식"]),
];

pub const VARIETIES: Lexicon = &[
    ("Geisha", &["geisha", "gesha", "게이샤"]),
    ("Pink Bourbon", &["pink bourbon", "핑크 버번"]),
    ("Bourbon", &["bourbon", "버번"]),
    ("Typica", &["typica", "티피카"]),
    ("Caturra", &["caturra", "카투라"]),
    ("Catuai", &["catuai", "카투아이"]),
    ("SL28", &["sl28", "sl-28"]),
    ("SL34", &["sl34", "sl-34"]),
    ("Pacamara", &["pacamara", "파카마라"]),
    ("Heirloom", &["heirloom", "74110", "74112", "에어룸"]),
    ("Castillo", &["castillo", "카스티요"]),
    ("Ruiru 11", &["ruiru 11", "ruiru"]),
    ("Maragogype", &["maragogype", "마라고지페"]),
    ("Mundo Novo", &["mundo novo", "문도노보"]),
    ("Sidra", &["sidra", "시드라"]),
    ("Java", &["java", "자바"]),
];

pub const ROAST_LEVELS: Lexicon = &[
    ("Medium-Dark", &["medium dark", "medium-dark", "중강배전"]),
    ("Medium-Light", &["medium light", "medium-light", "중약배전"]),
    ("Light", &["light roast", "light", "약배전", "라이트"]),
    ("Medium", &["medium roast", "medium", "중배전", "미디엄"]),
    ("Dark", &["dark roast", "dark", "강배전", "다크"]),
];

pub fn detect_origin(text: &str) -> Option<&'static str> {
    detect(ORIGINS, text)
}

pub fn detect_process(text: &str) -> Option<&'static str> {
    detect(PROCESSES, text)
}

pub fn detect_variety(text: &str) -> Option<&'static str> {
    detect(VARIETIES, text)
}

pub fn detect_roast_level(text: &str) -> Option<&'static str> {
    detect(ROAST_LEVELS, text)
}

/// Earliest alias hit in `text`, mapped to its canonical value.
pub fn detect(lexicon: Lexicon, text: &str) -> Option<&'static str> {
    let haystack = text.to_lowercase();
    let mut best: Option<(usize, usize, &'static str)> = None;

    for (canonical, aliases) in lexicon {
        for alias in *aliases {
            let Some(position) = find_term(&haystack, alias) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((pos, len, _)) => position < pos || (position == pos && alias.len() > len),
            };
            if better {
                best = Some((position, alias.len(), *canonical));
            }
        }
    }

    best.map(|(_, _, canonical)| canonical)
}

/// Byte offset of `term`, requiring ASCII word boundaries for ASCII terms.
fn find_term(haystack: &str, term: &str) -> Option<usize> {
    if !term.is_ascii() {
        return haystack.find(term);
    }

    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(term) {
        let start = from + offset;
        let end = start + term.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }
    None
}
